//! Minimal SVG line chart for sweep results.

use std::fmt::Write;

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 50.0;

/// Render `points` as an SVG line chart of accuracy against `param`.
///
/// The y axis spans the observed score range (padded when flat); points are
/// drawn in input order.
pub fn render_svg(param: &str, points: &[(u32, f64)]) -> String {
    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = write_svg(&mut svg, param, points);
    svg
}

fn write_svg(out: &mut String, param: &str, points: &[(u32, f64)]) -> std::fmt::Result {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" style="background-color: white;">"#
    )?;
    writeln!(
        out,
        r#"<text x="{}" y="25" text-anchor="middle" font-family="sans-serif" font-size="16">Random forest accuracy vs {param}</text>"#,
        WIDTH / 2.0
    )?;

    let (x0, x1) = (MARGIN, WIDTH - MARGIN);
    let (y0, y1) = (HEIGHT - MARGIN, MARGIN);
    writeln!(out, r#"<line x1="{x0}" y1="{y0}" x2="{x1}" y2="{y0}" stroke="black"/>"#)?;
    writeln!(out, r#"<line x1="{x0}" y1="{y0}" x2="{x0}" y2="{y1}" stroke="black"/>"#)?;
    writeln!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="12">{param}</text>"#,
        WIDTH / 2.0,
        HEIGHT - 12.0
    )?;
    writeln!(
        out,
        r#"<text x="14" y="{}" text-anchor="middle" font-family="sans-serif" font-size="12" transform="rotate(-90 14 {})">accuracy</text>"#,
        HEIGHT / 2.0,
        HEIGHT / 2.0
    )?;

    if !points.is_empty() {
        let (vmin, vmax) = bounds(points.iter().map(|&(v, _)| f64::from(v)));
        let (smin, smax) = bounds(points.iter().map(|&(_, s)| s));
        let sx = |v: f64| x0 + (v - vmin) / (vmax - vmin) * (x1 - x0);
        let sy = |s: f64| y0 - (s - smin) / (smax - smin) * (y0 - y1);

        let path: Vec<String> = points
            .iter()
            .map(|&(v, s)| format!("{:.1},{:.1}", sx(f64::from(v)), sy(s)))
            .collect();
        writeln!(
            out,
            r#"<polyline fill="none" stroke="steelblue" stroke-width="2" points="{}"/>"#,
            path.join(" ")
        )?;
        for &(v, s) in points {
            writeln!(
                out,
                r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="steelblue"><title>{param}={v}: {s:.4}</title></circle>"#,
                sx(f64::from(v)),
                sy(s)
            )?;
        }
        for (label, y) in [(smin, y0), (smax, y1)] {
            writeln!(
                out,
                r#"<text x="{}" y="{y}" text-anchor="end" font-family="sans-serif" font-size="10">{label:.3}</text>"#,
                x0 - 4.0
            )?;
        }
        for (label, x) in [(vmin, x0), (vmax, x1)] {
            writeln!(
                out,
                r#"<text x="{x}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="10">{label}</text>"#,
                y0 + 14.0
            )?;
        }
    }

    writeln!(out, "</svg>")
}

/// Min and max, widened so the span is never zero.
fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if hi - lo < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}
