//! Standalone SVG serialisation of a recorded [`Frame`].

use std::fmt::Write as _;

use super::surface::{Color, DrawCommand, Frame, Paint, TextAlign};

const FONT_FAMILY: &str = "Inter, sans-serif";

/// Replays `frame` into an SVG document sized to its backing store.
///
/// Transforms become nested groups; `Save`/`Restore` close the groups opened
/// in between. Paths persist across `Stroke`/`Fill` until the next `BeginPath`,
/// as on a canvas.
pub fn to_svg(frame: &Frame) -> String {
    let (width, height) = frame.pixel_size();
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );

    let mut defs = String::new();
    let mut body = String::new();
    let mut path = String::new();
    let mut open_groups = 0usize;
    let mut saved: Vec<usize> = Vec::new();
    let mut gradients = 0usize;

    for command in &frame.commands {
        match command {
            DrawCommand::Clear => {
                let _ = writeln!(
                    body,
                    r#"<rect x="0" y="0" width="{}" height="{}" fill="{}"/>"#,
                    num(frame.css_width),
                    num(frame.css_height),
                    Color::WHITE.hex()
                );
            }
            DrawCommand::Scale(k) => {
                let _ = writeln!(body, r#"<g transform="scale({})">"#, num(*k));
                open_groups += 1;
            }
            DrawCommand::BeginPath => path.clear(),
            DrawCommand::MoveTo(p) => {
                let _ = write!(path, "M{} {} ", num(p.x), num(p.y));
            }
            DrawCommand::LineTo(p) => {
                let _ = write!(path, "L{} {} ", num(p.x), num(p.y));
            }
            DrawCommand::BezierTo { c1, c2, to } => {
                let _ = write!(
                    path,
                    "C{} {} {} {} {} {} ",
                    num(c1.x),
                    num(c1.y),
                    num(c2.x),
                    num(c2.y),
                    num(to.x),
                    num(to.y)
                );
            }
            DrawCommand::QuadTo { control, to } => {
                let _ = write!(
                    path,
                    "Q{} {} {} {} ",
                    num(control.x),
                    num(control.y),
                    num(to.x),
                    num(to.y)
                );
            }
            DrawCommand::Arc { center, radius } => {
                // full circle as two half arcs
                let _ = write!(
                    path,
                    "M{} {} A{r} {r} 0 1 0 {} {} A{r} {r} 0 1 0 {} {} ",
                    num(center.x + radius),
                    num(center.y),
                    num(center.x - radius),
                    num(center.y),
                    num(center.x + radius),
                    num(center.y),
                    r = num(*radius)
                );
            }
            DrawCommand::ClosePath => path.push_str("Z "),
            DrawCommand::Stroke { color, width } => {
                let _ = writeln!(
                    body,
                    r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}"{}/>"#,
                    path.trim_end(),
                    color.hex(),
                    num(*width),
                    opacity_attr("stroke-opacity", color)
                );
            }
            DrawCommand::Fill(paint) => {
                let fill = match paint {
                    Paint::Solid(color) => {
                        format!(r#"fill="{}"{}"#, color.hex(), opacity_attr("fill-opacity", color))
                    }
                    Paint::LinearGradient {
                        start,
                        end,
                        from,
                        to,
                    } => {
                        gradients += 1;
                        let id = format!("fill{gradients}");
                        let _ = writeln!(
                            defs,
                            r#"<linearGradient id="{id}" gradientUnits="userSpaceOnUse" x1="{}" y1="{}" x2="{}" y2="{}"><stop offset="0" stop-color="{}" stop-opacity="{}"/><stop offset="1" stop-color="{}" stop-opacity="{}"/></linearGradient>"#,
                            num(start.x),
                            num(start.y),
                            num(end.x),
                            num(end.y),
                            from.hex(),
                            num(from.alpha),
                            to.hex(),
                            num(to.alpha)
                        );
                        format!(r#"fill="url(#{id})""#)
                    }
                };
                let _ = writeln!(body, r#"<path d="{}" {fill}/>"#, path.trim_end());
            }
            DrawCommand::Save => saved.push(open_groups),
            DrawCommand::Restore => {
                let target = saved.pop().unwrap_or(0);
                while open_groups > target {
                    body.push_str("</g>\n");
                    open_groups -= 1;
                }
            }
            DrawCommand::Translate(p) => {
                let _ = writeln!(body, r#"<g transform="translate({} {})">"#, num(p.x), num(p.y));
                open_groups += 1;
            }
            DrawCommand::Rotate(angle) => {
                let _ = writeln!(body, r#"<g transform="rotate({})">"#, num(angle.to_degrees()));
                open_groups += 1;
            }
            DrawCommand::Text {
                text,
                at,
                font_px,
                color,
                align,
            } => {
                let anchor = match align {
                    TextAlign::Center => "middle",
                };
                let _ = writeln!(
                    body,
                    r#"<text x="{}" y="{}" font-family="{FONT_FAMILY}" font-size="{}" fill="{}" text-anchor="{anchor}" dominant-baseline="middle">{}</text>"#,
                    num(at.x),
                    num(at.y),
                    num(*font_px),
                    color.hex(),
                    escape(text)
                );
            }
        }
    }
    for _ in 0..open_groups {
        body.push_str("</g>\n");
    }

    if !defs.is_empty() {
        let _ = write!(out, "<defs>\n{defs}</defs>\n");
    }
    out.push_str(&body);
    out.push_str("</svg>\n");
    out
}

fn opacity_attr(name: &str, color: &Color) -> String {
    if color.alpha >= 1.0 {
        String::new()
    } else {
        format!(r#" {name}="{}""#, num(color.alpha))
    }
}

/// Two decimals, trailing zeros trimmed.
fn num(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::Point;

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(1.5), "1.5");
        assert_eq!(num(1.234), "1.23");
        assert_eq!(num(-0.001), "0");
    }

    #[test]
    fn stroke_emits_path() {
        let mut frame = Frame::new(100.0, 50.0, 1.0);
        frame.extend([
            DrawCommand::BeginPath,
            DrawCommand::MoveTo(Point::new(0.0, 0.0)),
            DrawCommand::LineTo(Point::new(10.0, 5.0)),
            DrawCommand::Stroke {
                color: Color::rgb(0x25, 0x63, 0xeb),
                width: 3.0,
            },
        ]);
        let svg = to_svg(&frame);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r##"<path d="M0 0 L10 5" fill="none" stroke="#2563eb" stroke-width="3"/>"##));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn groups_balance_across_save_restore() {
        let mut frame = Frame::new(100.0, 50.0, 2.0);
        frame.extend([
            DrawCommand::Save,
            DrawCommand::Translate(Point::new(5.0, 5.0)),
            DrawCommand::Rotate(0.5),
            DrawCommand::Restore,
        ]);
        let svg = to_svg(&frame);
        assert_eq!(svg.matches("<g ").count(), svg.matches("</g>").count());
        assert!(svg.contains(r#"width="200" height="100""#));
    }

    #[test]
    fn gradient_goes_to_defs_and_text_is_escaped() {
        let mut frame = Frame::new(100.0, 50.0, 1.0);
        let green = Color::rgb(0x10, 0xb9, 0x81);
        frame.extend([
            DrawCommand::BeginPath,
            DrawCommand::MoveTo(Point::new(0.0, 0.0)),
            DrawCommand::ClosePath,
            DrawCommand::Fill(Paint::LinearGradient {
                start: Point::new(0.0, 0.0),
                end: Point::new(0.0, 50.0),
                from: green.with_alpha(0.2),
                to: green.with_alpha(0.0),
            }),
            DrawCommand::Text {
                text: "A<B & C".into(),
                at: Point::new(50.0, 25.0),
                font_px: 12.0,
                color: Color::WHITE,
                align: TextAlign::Center,
            },
        ]);
        let svg = to_svg(&frame);
        assert!(svg.contains("<defs>"));
        assert!(svg.contains(r#"fill="url(#fill1)""#));
        assert!(svg.contains("A&lt;B &amp; C"));
    }
}
