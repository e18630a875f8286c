//! Minimal SVG document builder and colour palette.

use std::fmt::Write as _;

/// Anchor colours of the viridis colour map, evenly spaced from 0 to 1.
const VIRIDIS: [(u8, u8, u8); 10] = [
    (0x44, 0x01, 0x54),
    (0x48, 0x28, 0x78),
    (0x3e, 0x49, 0x89),
    (0x31, 0x68, 0x8e),
    (0x26, 0x82, 0x8e),
    (0x1f, 0x9e, 0x89),
    (0x35, 0xb7, 0x79),
    (0x6e, 0xce, 0x58),
    (0xb5, 0xde, 0x2b),
    (0xfd, 0xe7, 0x25),
];

/// `n` colours sampled evenly across the viridis colour map, darkest first.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn viridis(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            let position = t * (VIRIDIS.len() - 1) as f64;
            let lower = (position.floor() as usize).min(VIRIDIS.len() - 1);
            let upper = (lower + 1).min(VIRIDIS.len() - 1);
            let frac = position - lower as f64;
            let mix =
                |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
            let (r0, g0, b0) = VIRIDIS[lower];
            let (r1, g1, b1) = VIRIDIS[upper];
            format!("#{:02x}{:02x}{:02x}", mix(r0, r1), mix(g0, g1), mix(b0, b1))
        })
        .collect()
}

/// Horizontal alignment of text relative to its anchor point.
#[derive(Clone, Copy, Debug)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

/// Accumulates SVG elements and renders them into a standalone document.
#[derive(Debug)]
pub struct Svg {
    width: f64,
    height: f64,
    body: String,
}

impl Svg {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    pub fn rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: &str,
        tooltip: Option<&str>,
    ) {
        let _ = write!(
            self.body,
            r#"<rect x="{x:.2}" y="{y:.2}" width="{:.2}" height="{:.2}" "#,
            width.max(0.0),
            height.max(0.0)
        );
        let _ = write!(self.body, r#"fill="{fill}" stroke="{fill}">"#);
        if let Some(tooltip) = tooltip {
            let _ = write!(self.body, "<title>{}</title>", escape(tooltip));
        }
        self.body.push_str("</rect>\n");
    }

    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, width: f64) {
        let _ = write!(
            self.body,
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{stroke}" "#,
            from.0, from.1, to.0, to.1
        );
        let _ = writeln!(self.body, r#"stroke-width="{width}"/>"#);
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], stroke: &str, width: f64) {
        let points: Vec<String> = points.iter().map(|(x, y)| format!("{x:.2},{y:.2}")).collect();
        let _ = writeln!(
            self.body,
            r#"<polyline points="{}" fill="none" stroke="{stroke}" stroke-width="{width}"/>"#,
            points.join(" ")
        );
    }

    pub fn circle(&mut self, center: (f64, f64), radius: f64, fill: &str, tooltip: Option<&str>) {
        let _ = write!(
            self.body,
            r#"<circle cx="{:.2}" cy="{:.2}" r="{radius}" fill="{fill}">"#,
            center.0, center.1
        );
        if let Some(tooltip) = tooltip {
            let _ = write!(self.body, "<title>{}</title>", escape(tooltip));
        }
        self.body.push_str("</circle>\n");
    }

    /// Draws text, one line per `\n`, optionally rotated by `rotate` degrees around its anchor.
    pub fn text(
        &mut self,
        at: (f64, f64),
        text: &str,
        size: f64,
        anchor: Anchor,
        rotate: Option<f64>,
    ) {
        let (x, y) = at;
        let transform = rotate.map_or_else(String::new, |deg| {
            format!(r#" transform="rotate({deg} {x:.2} {y:.2})""#)
        });
        let _ = write!(
            self.body,
            r#"<text x="{x:.2}" y="{y:.2}" font-size="{size}" text-anchor="{}"{transform}>"#,
            anchor.as_str()
        );
        for (i, line) in text.lines().enumerate() {
            let dy = if i == 0 { 0.0 } else { size * 1.2 };
            let _ = write!(
                self.body,
                r#"<tspan x="{x:.2}" dy="{dy:.2}">{}</tspan>"#,
                escape(line)
            );
        }
        self.body.push_str("</text>\n");
    }

    /// Renders the complete document.
    pub fn finish(self, title: &str) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" \
             viewBox=\"0 0 {w} {h}\" \
             font-family=\"Helvetica, Arial, sans-serif\">\n<title>{}</title>\n\
             <rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" fill=\"white\"/>\n{}</svg>\n",
            escape(title),
            self.body,
            w = self.width,
            h = self.height,
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
