use qrcode::QrCode;
use qrcode::render::{svg, unicode};
use qrcode::types::QrError;

/// Renders a pairing code for a terminal, two modules per character cell.
pub fn render_terminal(code: &str) -> Result<String, QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

pub fn render_svg(code: &str) -> Result<String, QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "2@kP9wQ1bX,3vT0aYl2mN8cR5s=,Zp4Hq7uJx1kW9e=,fA3dL6gS0h=";

    #[test]
    fn terminal_rendering_is_multiline() {
        let out = render_terminal(CODE).unwrap();
        assert!(out.lines().count() > 10);
    }

    #[test]
    fn svg_rendering() {
        let out = render_svg(CODE).unwrap();
        assert!(out.contains("<svg"));
        assert!(out.contains("#000000"));
    }
}
