//! Reference chart renderer: an inline SVG sparkline.
//!
//! The root is an `svg` element created inside the mount element. It holds a
//! `polyline` for the line and a `circle` spot on the last point; both are
//! reused on every render.

use serde::{
  Deserialize,
  Serialize,
};
use the_hooks_lib::{
  chart::{
    ChartError,
    ChartRenderer,
  },
  page::{
    ElementId,
    Page,
  },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SparklineConfig {
  pub width:       f64,
  pub height:      f64,
  pub margin:      f64,
  pub spot_radius: f64,
}

impl Default for SparklineConfig {
  fn default() -> Self {
    Self {
      width:       240.0,
      height:      20.0,
      margin:      2.0,
      spot_radius: 2.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparklineRoot {
  pub svg:  ElementId,
  pub line: ElementId,
  pub spot: ElementId,
}

pub struct SparklineRenderer {
  page:   Page,
  config: SparklineConfig,
}

impl SparklineRenderer {
  pub fn new(page: Page, config: SparklineConfig) -> Self {
    Self { page, config }
  }

  /// Map `points` into the drawing box: left to right, larger values higher.
  /// A flat series sits in the vertical middle.
  pub fn coordinates(&self, points: &[f64]) -> Vec<(f64, f64)> {
    let SparklineConfig {
      width,
      height,
      margin,
      ..
    } = self.config;
    let Some(max) = points.iter().copied().reduce(f64::max) else {
      return Vec::new();
    };
    let min = points.iter().copied().fold(max, f64::min);

    // Halved so the span of finite extremes cannot overflow.
    let half_span = max / 2.0 - min / 2.0;
    let inner_height = height - margin * 2.0;
    let steps = points.len().saturating_sub(1).max(1) as f64;
    let h_factor = (width - margin * 2.0) / steps;

    points
      .iter()
      .enumerate()
      .map(|(i, value)| {
        let x = i as f64 * h_factor + margin;
        let y = if half_span > 0.0 {
          (max / 2.0 - value / 2.0) / half_span * inner_height
        } else {
          inner_height / 2.0
        };
        (x, y + margin)
      })
      .collect()
  }
}

fn format_coordinate(value: f64) -> String {
  let rounded = (value * 100.0).round() / 100.0;
  format!("{rounded}")
}

impl ChartRenderer for SparklineRenderer {
  type Root = SparklineRoot;

  fn create_root(&self, page: &Page, mount: ElementId) -> Result<SparklineRoot, ChartError> {
    let width = format_coordinate(self.config.width);
    let height = format_coordinate(self.config.height);
    let view_box = format!("0 0 {width} {height}");
    let svg = page
      .create_element_with(mount, "svg", &[
        ("width", width.as_str()),
        ("height", height.as_str()),
        ("viewBox", view_box.as_str()),
        ("preserveAspectRatio", "none"),
      ])
      .map_err(|_| ChartError::MissingMount(mount))?;
    let line = page
      .create_element_with(svg, "polyline", &[("style", "fill: none")])
      .map_err(|_| ChartError::MissingMount(mount))?;
    let spot = page
      .create_element(svg, "circle")
      .map_err(|_| ChartError::MissingMount(mount))?;
    Ok(SparklineRoot { svg, line, spot })
  }

  fn render(&self, root: &SparklineRoot, points: &[f64]) {
    let coordinates = self.coordinates(points);
    let polyline = coordinates
      .iter()
      .map(|(x, y)| format!("{},{}", format_coordinate(*x), format_coordinate(*y)))
      .collect::<Vec<_>>()
      .join(" ");

    let page = &self.page;
    let mut result = page.set_attribute(root.line, "points", &polyline);
    result = result.and_then(|()| {
      match coordinates.last() {
        Some((x, y)) => {
          page.set_attribute(root.spot, "cx", &format_coordinate(*x))?;
          page.set_attribute(root.spot, "cy", &format_coordinate(*y))?;
          page.set_attribute(root.spot, "r", &format_coordinate(self.config.spot_radius))
        },
        None => page.set_attribute(root.spot, "r", "0"),
      }
    });
    if let Err(err) = result {
      tracing::warn!(svg = %root.svg, %err, "failed to render sparkline");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn renderer(page: &Page) -> SparklineRenderer {
    SparklineRenderer::new(page.clone(), SparklineConfig::default())
  }

  #[test]
  fn coordinates_fill_the_box() {
    let page = Page::new();
    let coords = renderer(&page).coordinates(&[0.0, 8.0, 16.0]);
    assert_eq!(coords, vec![(2.0, 18.0), (120.0, 10.0), (238.0, 2.0)]);
  }

  #[test]
  fn flat_and_single_series_stay_in_range() {
    let page = Page::new();
    let renderer = renderer(&page);
    assert_eq!(renderer.coordinates(&[5.0]), vec![(2.0, 10.0)]);
    assert!(renderer.coordinates(&[]).is_empty());
    for (_, y) in renderer.coordinates(&[3.0, 3.0, 3.0]) {
      assert!((2.0..=18.0).contains(&y));
    }
  }

  #[test]
  fn extreme_values_stay_finite() {
    let page = Page::new();
    let coords = renderer(&page).coordinates(&[1e308, -1e308, 0.0]);
    assert!(coords.iter().all(|(x, y)| x.is_finite() && y.is_finite()));
    assert_eq!(coords[0].1, 2.0);
    assert_eq!(coords[1].1, 18.0);
    assert_eq!(coords[2].1, 10.0);
  }

  #[test]
  fn render_reuses_root_elements() {
    let page = Page::new();
    let mount = page.create_element(page.document_element(), "span").unwrap();
    let renderer = renderer(&page);
    let root = renderer.create_root(&page, mount).unwrap();

    renderer.render(&root, &[1.0, 2.0]);
    renderer.render(&root, &[0.0, 8.0, 16.0]);

    assert_eq!(page.children(mount), vec![root.svg]);
    assert_eq!(
      page.attribute(root.line, "points").as_deref(),
      Some("2,18 120,10 238,2")
    );
    assert_eq!(page.attribute(root.spot, "cx").as_deref(), Some("238"));
    assert_eq!(page.attribute(root.svg, "height").as_deref(), Some("20"));

    renderer.render(&root, &[]);
    assert_eq!(page.attribute(root.line, "points").as_deref(), Some(""));
    assert_eq!(page.attribute(root.spot, "r").as_deref(), Some("0"));
  }

  #[test]
  fn missing_mount_is_an_error() {
    let page = Page::new();
    let mount = page.create_element(page.document_element(), "span").unwrap();
    page.remove_element(mount).unwrap();
    assert_eq!(
      renderer(&page).create_root(&page, mount).err(),
      Some(ChartError::MissingMount(mount))
    );
  }
}
