use crate::protocol::{JobMessage, JobStatus, ViewshedAttributes};

/// What the job-status panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayText {
    Prompt(String),
    /// Shown with a busy indicator.
    Busy(String),
    /// Error panel: one `"{kind}: {description}"` line per message.
    Errors(Vec<String>),
    Success(String),
    Empty,
}

impl DisplayText {
    pub fn is_error(&self) -> bool {
        matches!(self, DisplayText::Errors(_))
    }
}

impl std::fmt::Display for DisplayText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayText::Prompt(text) | DisplayText::Busy(text) | DisplayText::Success(text) => {
                f.write_str(text)
            }
            DisplayText::Errors(items) => {
                f.write_str("Messages")?;
                for item in items {
                    write!(f, "\n  - {item}")?;
                }
                Ok(())
            }
            DisplayText::Empty => Ok(()),
        }
    }
}

/// Maps a job status to panel text. Pure: equal inputs give equal output.
pub fn render(status: JobStatus, messages: &[JobMessage]) -> DisplayText {
    match status {
        JobStatus::None => {
            DisplayText::Prompt("Set observer location by clicking on the map...".to_string())
        }
        JobStatus::New | JobStatus::Submitted | JobStatus::Waiting => {
            DisplayText::Busy("Calculating viewshed...".to_string())
        }
        JobStatus::Executing => DisplayText::Busy(format!("Status: {}...", status.name())),
        JobStatus::Cancelling
        | JobStatus::Cancelled
        | JobStatus::Deleting
        | JobStatus::Deleted
        | JobStatus::TimedOut
        | JobStatus::Failed => render_errors(messages),
        JobStatus::Succeeded => {
            DisplayText::Success("Viewshed calculated successfully".to_string())
        }
        JobStatus::Cleared => DisplayText::Empty,
    }
}

pub fn render_errors(messages: &[JobMessage]) -> DisplayText {
    DisplayText::Errors(
        messages
            .iter()
            .map(|m| format!("{}: {}", m.kind, m.description))
            .collect(),
    )
}

/// Summary of a viewshed result for the info panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureInfo {
    pub title: String,
    /// `(label, value)` pairs of the visible fields that are present.
    pub fields: Vec<(String, String)>,
}

impl std::fmt::Display for FeatureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)?;
        for (label, value) in &self.fields {
            write!(f, "\n  {label}: {value}")?;
        }
        Ok(())
    }
}

pub fn describe_viewshed(attrs: &ViewshedAttributes) -> FeatureInfo {
    let title = format!(
        "{} @ {}",
        attrs.product_name.as_deref().unwrap_or_default(),
        attrs.dem_resolution.as_deref().unwrap_or_default()
    );

    let text_fields = [
        ("DEM Resolution", &attrs.dem_resolution),
        ("Product Name", &attrs.product_name),
        ("Source", &attrs.source),
        ("Source URL", &attrs.source_url),
    ];
    let number_fields = [
        ("Perimeter Kilometers", attrs.perimeter_km),
        ("Area Square Kilometers", attrs.area_sq_km),
    ];

    let mut fields = Vec::new();
    for (label, value) in text_fields {
        if let Some(value) = value {
            fields.push((label.to_string(), value.clone()));
        }
    }
    for (label, value) in number_fields {
        if let Some(value) = value {
            fields.push((label.to_string(), format_grouped(value, 2)));
        }
    }

    FeatureInfo { title, fields }
}

/// Fixed decimals with comma digit grouping, e.g. `12,345.68`.
fn format_grouped(value: f64, places: usize) -> String {
    let fixed = format!("{:.*}", places, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    if value.is_sign_negative() && !is_zero {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::{DisplayText, describe_viewshed, format_grouped, render};
    use crate::protocol::{JobMessage, JobStatus, ViewshedAttributes};
    use pretty_assertions::assert_eq;

    #[test]
    fn every_status_has_a_rendering() {
        let msgs = vec![JobMessage::error("DEM unavailable")];
        for status in JobStatus::ALL {
            let text = render(status, &msgs);
            let expect_error = matches!(
                status,
                JobStatus::Cancelling
                    | JobStatus::Cancelled
                    | JobStatus::Deleting
                    | JobStatus::Deleted
                    | JobStatus::TimedOut
                    | JobStatus::Failed
            );
            assert_eq!(text.is_error(), expect_error, "{status}");
        }
    }

    #[test]
    fn busy_and_terminal_texts() {
        assert_eq!(
            render(JobStatus::Waiting, &[]),
            DisplayText::Busy("Calculating viewshed...".into())
        );
        assert_eq!(
            render(JobStatus::Executing, &[]).to_string(),
            "Status: executing..."
        );
        assert_eq!(
            render(JobStatus::Succeeded, &[]).to_string(),
            "Viewshed calculated successfully"
        );
        assert_eq!(render(JobStatus::Cleared, &[]).to_string(), "");
        assert!(render(JobStatus::None, &[]).to_string().starts_with("Set observer location"));
    }

    #[test]
    fn error_panel_lists_messages_in_order() {
        let msgs = vec![
            JobMessage::new("Informative", "Executing (Viewshed)"),
            JobMessage::error("DEM unavailable"),
        ];
        let text = render(JobStatus::Failed, &msgs);
        assert_eq!(
            text,
            DisplayText::Errors(vec![
                "Informative: Executing (Viewshed)".into(),
                "Error: DEM unavailable".into(),
            ])
        );
        assert!(text.to_string().contains("Error: DEM unavailable"));
        assert_eq!(render(JobStatus::Failed, &msgs), text);
    }

    #[test]
    fn viewshed_summary_formats_numbers() {
        let attrs = ViewshedAttributes {
            dem_resolution: Some("10m".into()),
            product_name: Some("NED".into()),
            perimeter_km: Some(12345.678),
            area_sq_km: Some(0.5),
            shape_area: Some(1.0),
            ..Default::default()
        };
        let info = describe_viewshed(&attrs);
        assert_eq!(info.title, "NED @ 10m");
        assert_eq!(
            info.fields,
            vec![
                ("DEM Resolution".to_string(), "10m".to_string()),
                ("Product Name".to_string(), "NED".to_string()),
                ("Perimeter Kilometers".to_string(), "12,345.68".to_string()),
                ("Area Square Kilometers".to_string(), "0.50".to_string()),
            ]
        );
    }

    #[test]
    fn grouping_handles_signs_and_small_values() {
        assert_eq!(format_grouped(1_234_567.0, 2), "1,234,567.00");
        assert_eq!(format_grouped(-1234.5, 2), "-1,234.50");
        assert_eq!(format_grouped(999.999, 2), "1,000.00");
        assert_eq!(format_grouped(-0.001, 2), "0.00");
    }
}
