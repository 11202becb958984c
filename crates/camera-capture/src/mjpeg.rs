//! MJPEG multipart framing
//!
//! Browsers render `multipart/x-mixed-replace` responses as a live image,
//! replacing the picture with every part received.

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Content type of the streaming response
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wrap one JPEG image as a multipart part
pub fn part(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut out = Vec::with_capacity(header.len() + jpeg.len() + 2);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(jpeg);
    out.extend_from_slice(b"\r\n");
    out
}
