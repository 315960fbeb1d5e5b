use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
    pub axis: Axis,
}

/// Chart data for one dashboard panel. Rendering is left to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartPanel {
    Bar {
        title: String,
        orientation: Orientation,
        label_axis: String,
        value_axis: String,
        labels: Vec<String>,
        values: Vec<f64>,
    },
    Pie {
        title: String,
        labels: Vec<String>,
        values: Vec<f64>,
    },
    TimeSeries {
        title: String,
        dates: Vec<String>,
        series: Vec<Series>,
    },
    Placeholder {
        message: String,
    },
}

impl ChartPanel {
    pub fn placeholder(message: impl Into<String>) -> Self {
        ChartPanel::Placeholder {
            message: message.into(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ChartPanel::Placeholder { .. })
    }
}

/// Counts occurrences, keeping the order in which labels first appear.
pub fn count_in_order<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(seen, _)| seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }
    counts
}
