use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eframe::egui::{self, Color32, ColorImage, Rect, Stroke, Ui};
use image::{Rgba, RgbaImage};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, PlotUi, Points, Polygon};

use crate::chart::{self, PlotKind};
use crate::color::{self, ColorMap};
use crate::data::model::{TableView, Value};
use crate::state::PlotSettings;

// ---------------------------------------------------------------------------
// Central plot
// ---------------------------------------------------------------------------

/// Render the configured plot of the displayed rows.
pub fn data_plot(ui: &mut Ui, view: Option<&TableView>, settings: &PlotSettings) {
    let Some(view) = view else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to plot it  (File → Open…)");
        });
        return;
    };
    let (Some(x), y) = (settings.x.as_deref(), settings.y.as_deref()) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("Choose the columns to plot in the side panel.");
        });
        return;
    };
    let y = match (settings.kind.needs_y(), y) {
        (true, None) => {
            ui.label("Choose a Y column.");
            return;
        }
        (_, y) => y.unwrap_or(x),
    };

    // Prepare first so a bad column choice shows a message instead of an
    // empty plot.
    let prepared = match prepare(view, settings, x, y) {
        Ok(p) => p,
        Err(e) => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.colored_label(Color32::RED, format!("{e:#}"));
            });
            return;
        }
    };

    let y_label = match settings.kind {
        PlotKind::Histogram => "Count".to_string(),
        _ => y.to_string(),
    };
    Plot::new("data_plot")
        .legend(Legend::default())
        .x_axis_label(x.to_string())
        .y_axis_label(y_label)
        .show_grid(settings.show_grid)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| draw(plot_ui, prepared, settings));
}

enum Prepared {
    Scatter(Vec<chart::ScatterSeries>),
    ErrorBar(Vec<chart::ErrorPoint>),
    Histogram(chart::Histogram),
    Density(chart::DensityGrid),
}

fn prepare(
    view: &TableView,
    settings: &PlotSettings,
    x: &str,
    y: &str,
) -> anyhow::Result<Prepared> {
    Ok(match settings.kind {
        PlotKind::Scatter => Prepared::Scatter(chart::scatter_series(
            view,
            x,
            y,
            settings.color_by.as_deref(),
        )?),
        PlotKind::ErrorBar => Prepared::ErrorBar(chart::error_points(
            view,
            x,
            y,
            settings.x_err.as_deref(),
            settings.y_err.as_deref(),
        )?),
        PlotKind::Histogram => Prepared::Histogram(chart::histogram(view, x, settings.bins)?),
        PlotKind::Density => Prepared::Density(chart::density(view, x, y, settings.bins)?),
    })
}

fn draw(plot_ui: &mut PlotUi, prepared: Prepared, settings: &PlotSettings) {
    match prepared {
        Prepared::Scatter(series) => {
            let keys: Vec<&Value> = series.iter().filter_map(|s| s.key.as_ref()).collect();
            let color_map = ColorMap::new(keys);
            for s in series {
                let (name, color) = match &s.key {
                    Some(key) => (key.to_string(), color_map.color_for(key)),
                    None => (String::new(), settings.color),
                };
                let points: PlotPoints = s.points.into();
                plot_ui.points(
                    Points::new(points)
                        .name(name)
                        .color(color)
                        .radius(settings.point_size),
                );
            }
        }
        Prepared::ErrorBar(points) => {
            let stroke = Stroke::new(1.0, settings.color.gamma_multiply(0.7));
            for p in &points {
                if let Some(e) = p.y_err {
                    plot_ui.line(
                        Line::new(PlotPoints::from(vec![[p.x, p.y - e], [p.x, p.y + e]]))
                            .stroke(stroke),
                    );
                }
                if let Some(e) = p.x_err {
                    plot_ui.line(
                        Line::new(PlotPoints::from(vec![[p.x - e, p.y], [p.x + e, p.y]]))
                            .stroke(stroke),
                    );
                }
            }
            let centers: PlotPoints = points.iter().map(|p| [p.x, p.y]).collect();
            plot_ui.points(
                Points::new(centers)
                    .color(settings.color)
                    .radius(settings.point_size),
            );
        }
        Prepared::Histogram(hist) => {
            let width = hist.bin_width();
            let bars: Vec<Bar> = hist
                .centers()
                .zip(&hist.counts)
                .map(|(center, &count)| Bar::new(center, count as f64).width(width))
                .collect();
            plot_ui.bar_chart(BarChart::new(bars).color(settings.color));
        }
        Prepared::Density(grid) => {
            let max = grid.max_count().max(1) as f32;
            for (ix, column) in grid.counts.iter().enumerate() {
                for (iy, &count) in column.iter().enumerate() {
                    if count == 0 {
                        continue;
                    }
                    let (x0, x1) = (grid.x_edges[ix], grid.x_edges[ix + 1]);
                    let (y0, y1) = (grid.y_edges[iy], grid.y_edges[iy + 1]);
                    let fill = color::viridis(count as f32 / max);
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::from(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]))
                            .fill_color(fill)
                            .stroke(Stroke::NONE),
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Saving the plot as an image
// ---------------------------------------------------------------------------

/// Carried through `ViewportCommand::Screenshot` so the frame that delivers
/// the screenshot knows where to write it and what to crop.
#[derive(Debug, Clone)]
pub struct PlotImageRequest {
    pub path: PathBuf,
    /// Plot area in points.
    pub rect: Option<Rect>,
}

/// Ask the backend for a screenshot of the window. It arrives as an
/// `Event::Screenshot` on a later frame; see [`take_plot_image`].
pub fn request_plot_image(ctx: &egui::Context, request: PlotImageRequest) {
    ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(egui::UserData::new(request)));
}

/// Pick up a screenshot requested by [`request_plot_image`], cropped to the
/// plot area.
pub fn take_plot_image(ctx: &egui::Context) -> Option<(PlotImageRequest, ColorImage)> {
    let pixels_per_point = ctx.pixels_per_point();
    ctx.input(|i| {
        i.events.iter().rev().find_map(|e| {
            let egui::Event::Screenshot { image, user_data, .. } = e else {
                return None;
            };
            let request = user_data
                .data
                .as_ref()
                .and_then(|u| u.downcast_ref::<PlotImageRequest>())?
                .clone();
            let cropped = match request.rect {
                Some(rect) => image.region(&rect, Some(pixels_per_point)),
                None => (**image).clone(),
            };
            Some((request, cropped))
        })
    })
}

/// Write `image` as PNG.
pub fn save_png(img: &ColorImage, path: &Path) -> Result<()> {
    let [w, h] = img.size;
    let mut out = RgbaImage::new(w as u32, h as u32);
    for (i, pixel) in img.pixels.iter().enumerate() {
        let [r, g, b, a] = pixel.to_srgba_unmultiplied();
        out.put_pixel((i % w) as u32, (i / w) as u32, Rgba([r, g, b, a]));
    }
    out.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_keeps_size_and_colours() {
        let mut img = ColorImage::new([3, 2], Color32::WHITE);
        img.pixels[4] = Color32::from_rgb(200, 10, 20);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        save_png(&img, &path).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(1, 1), &Rgba([200, 10, 20, 255]));
        assert_eq!(back.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }
}
