//! SVG renderings of the feature-engineering diagnostics

use std::fmt::Write;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
}

/// Blue (-1) through white (0) to red (+1)
fn diverging_color(value: f64) -> String {
    let v = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
    let fade = |t: f64| (255.0 * (1.0 - t.abs())).round() as u8;
    let (r, g, b) = if v >= 0.0 {
        (255, fade(v), fade(v))
    } else {
        (fade(v), fade(v), 255)
    };
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Annotated correlation heatmap
pub fn correlation_heatmap_svg(labels: &[String], matrix: &ndarray::Array2<f64>, title: &str) -> String {
    const CELL: usize = 56;
    const MARGIN: usize = 140;
    let n = labels.len();
    let size = MARGIN + n * CELL + 20;

    let mut svg = String::with_capacity(1024 + n * n * 160);
    let _ = writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{size}' height='{size}' font-family='Arial' font-size='11'>"
    );
    let _ = writeln!(svg, "<text x='{}' y='20' font-size='16' text-anchor='middle'>{}</text>", size / 2, escape(title));

    for (i, label) in labels.iter().enumerate() {
        let centre = MARGIN + i * CELL + CELL / 2;
        let _ = writeln!(
            svg,
            "<text x='{}' y='{}' text-anchor='end'>{}</text>",
            MARGIN - 6,
            centre + 4,
            escape(label)
        );
        let _ = writeln!(
            svg,
            "<text x='{centre}' y='{y}' text-anchor='start' transform='rotate(-45 {centre} {y})'>{}</text>",
            escape(label),
            y = MARGIN - 6
        );
    }

    for i in 0..n {
        for j in 0..n {
            let value = matrix[[i, j]];
            let x = MARGIN + j * CELL;
            let y = MARGIN + i * CELL;
            let _ = writeln!(
                svg,
                "<rect x='{x}' y='{y}' width='{CELL}' height='{CELL}' fill='{}' stroke='#ffffff'/>",
                diverging_color(value)
            );
            let _ = writeln!(
                svg,
                "<text x='{}' y='{}' text-anchor='middle'>{:.2}</text>",
                x + CELL / 2,
                y + CELL / 2 + 4,
                value
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}

/// Vertical bar chart, bars in the given order
pub fn bar_chart_svg(labels: &[String], values: &[f64], title: &str) -> String {
    const BAR: usize = 28;
    const HEIGHT: usize = 300;
    const TOP: usize = 40;
    const LEFT: usize = 60;
    const LABEL_SPACE: usize = 150;
    let width = LEFT + labels.len().max(1) * BAR + 20;
    let max = values.iter().copied().filter(|v| v.is_finite()).fold(0.0f64, f64::max);
    let scale = if max > 0.0 { HEIGHT as f64 / max } else { 0.0 };

    let mut svg = String::with_capacity(512 + labels.len() * 256);
    let _ = writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{width}' height='{}' font-family='Arial' font-size='11'>",
        TOP + HEIGHT + LABEL_SPACE
    );
    let _ = writeln!(svg, "<text x='{}' y='22' font-size='16' text-anchor='middle'>{}</text>", width / 2, escape(title));
    let _ = writeln!(
        svg,
        "<line x1='{LEFT}' y1='{TOP}' x2='{LEFT}' y2='{b}' stroke='#333'/><line x1='{LEFT}' y1='{b}' x2='{width}' y2='{b}' stroke='#333'/>",
        b = TOP + HEIGHT
    );
    let _ = writeln!(svg, "<text x='{}' y='{}' text-anchor='end'>{:.3}</text>", LEFT - 4, TOP + 4, max);

    for (i, (label, value)) in labels.iter().zip(values).enumerate() {
        let h = if value.is_finite() { (value.max(0.0) * scale).round() as usize } else { 0 };
        let x = LEFT + i * BAR + 4;
        let _ = writeln!(
            svg,
            "<rect x='{x}' y='{}' width='{}' height='{h}' fill='#4c72b0'><title>{}: {:.4}</title></rect>",
            TOP + HEIGHT - h,
            BAR - 8,
            escape(label),
            value
        );
        let lx = x + (BAR - 8) / 2;
        let ly = TOP + HEIGHT + 10;
        let _ = writeln!(
            svg,
            "<text x='{lx}' y='{ly}' text-anchor='end' transform='rotate(-45 {lx} {ly})'>{}</text>",
            escape(label)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_heatmap_cells_and_labels() {
        let labels = vec!["age".to_string(), "balance".to_string()];
        let svg = correlation_heatmap_svg(&labels, &array![[1.0, -0.5], [-0.5, 1.0]], "Feature Correlation Heatmap");
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<rect").count(), 4);
        assert!(svg.contains(">-0.50<"));
        assert!(svg.contains(">balance<"));
    }

    #[test]
    fn test_bar_chart_escapes_labels() {
        let svg = bar_chart_svg(&["job_blue<collar>".to_string()], &[0.2], "Feature Importance");
        assert!(svg.contains("job_blue&lt;collar&gt;"));
        assert_eq!(svg.matches("<rect").count(), 1);
    }

    #[test]
    fn test_colors() {
        assert_eq!(diverging_color(1.0), "#ff0000");
        assert_eq!(diverging_color(-1.0), "#0000ff");
        assert_eq!(diverging_color(0.0), "#ffffff");
    }
}
