use routeprof::{DrawingSurface, SeriesStyle};
use textplots::{Chart, Plot, Shape};

/// Draws series as ASCII line plots on the terminal.
pub struct TerminalPlot {
    width: u32,
    height: u32,
}

impl Default for TerminalPlot {
    fn default() -> Self {
        Self {
            width: 300,
            height: 150,
        }
    }
}

impl DrawingSurface for TerminalPlot {
    #[allow(clippy::cast_possible_truncation)]
    fn draw_series(&mut self, points: &[(f64, f64)], style: &SeriesStyle) {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return;
        };
        let plot_data: Vec<(f32, f32)> = points
            .iter()
            .map(|(distance, elevation)| (*distance as f32, *elevation as f32))
            .collect();
        println!("{}", style.label);
        Chart::new(self.width, self.height, first.0 as f32, last.0 as f32)
            .lineplot(&Shape::Lines(&plot_data))
            .display();
    }
}
