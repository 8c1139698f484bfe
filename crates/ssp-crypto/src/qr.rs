//! Secret export/import via QR code
//!
//! Payload framing: `SSP1:` prefix + standard base64 of the raw
//! secret bytes. The prefix versions the format so a scanner-side
//! importer can reject foreign codes before touching the payload.
//!
//! Decoding operates on the scanned *text* (what a scanner app
//! yields); pixel-level recognition belongs to the shell, not here.

use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use zeroize::Zeroizing;

use ssp_core::{SspError, SspResult};

/// Payload prefix marking Secure Suite secret exports.
pub const PAYLOAD_PREFIX: &str = "SSP1:";

/// Hard cap on the secret size accepted for export. QR capacity at
/// EC level M tops out near 2.3 KiB of byte-mode data; base64 plus
/// the prefix eats ~a third of that.
pub const MAX_SECRET_LEN: usize = 1024;

/// A scannable encoding of a secret payload.
pub struct VisualCode {
    payload: String,
    code: QrCode,
}

impl VisualCode {
    /// The text a scanner will yield (prefix + base64 payload).
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Render as a terminal-friendly Unicode block drawing.
    pub fn to_unicode(&self) -> String {
        self.code
            .render::<qrcode::render::unicode::Dense1x2>()
            .quiet_zone(true)
            .build()
    }

    /// Render as an SVG document.
    pub fn to_svg(&self) -> String {
        self.code
            .render::<qrcode::render::svg::Color>()
            .min_dimensions(240, 240)
            .build()
    }

    /// Matrix width in modules, useful for sizing display surfaces.
    pub fn width(&self) -> usize {
        self.code.width()
    }
}

impl std::fmt::Debug for VisualCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The payload is a secret; show only its size.
        f.debug_struct("VisualCode")
            .field("payload_len", &self.payload.len())
            .field("width", &self.code.width())
            .finish()
    }
}

/// Encode a secret into a QR code at error-correction level M.
///
/// Oversized inputs fail with `PayloadTooLarge`; nothing is ever
/// silently truncated.
pub fn encode_secret(secret: &[u8]) -> SspResult<VisualCode> {
    if secret.len() > MAX_SECRET_LEN {
        return Err(SspError::PayloadTooLarge {
            size: secret.len(),
            limit: MAX_SECRET_LEN,
        });
    }

    let payload = format!("{PAYLOAD_PREFIX}{}", b64_encode(secret));
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M).map_err(
        |e| match e {
            QrError::DataTooLong => SspError::PayloadTooLarge {
                size: secret.len(),
                limit: MAX_SECRET_LEN,
            },
            other => SspError::InvalidParameters(format!("QR encoding: {other:?}")),
        },
    )?;

    Ok(VisualCode { payload, code })
}

/// Invert a scanned payload back into the secret bytes.
pub fn decode_secret(payload: &str) -> SspResult<Zeroizing<Vec<u8>>> {
    let encoded = payload.strip_prefix(PAYLOAD_PREFIX).ok_or_else(|| {
        SspError::InvalidParameters("scanned payload is not a Secure Suite export".into())
    })?;
    let bytes = b64_decode(encoded.trim())?;
    Ok(Zeroizing::new(bytes))
}

fn b64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn b64_decode(data: &str) -> SspResult<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD
        .decode(data)
        .map_err(|_| SspError::InvalidParameters("scanned payload is not valid base64".into()))
}
