//! One parameterized list view: each queue is a column spec over the same row type.

use serde::Serialize;

use reqflow_core::domain::queue::QueueKind;
use reqflow_core::domain::request::Request;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Plant,
    Owner,
    Description,
    PartCode,
    Submitted,
    Status,
    Approver,
    ReasonForReturn,
    Modified,
    ValidationStatus,
    ValidatedBy,
}

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Plant => "Plant",
            Self::Owner => "Owner",
            Self::Description => "Description",
            Self::PartCode => "Part Code",
            Self::Submitted => "Submitted",
            Self::Status => "Status",
            Self::Approver => "Approver",
            Self::ReasonForReturn => "Reason for Return",
            Self::Modified => "Modified",
            Self::ValidationStatus => "Validation Status",
            Self::ValidatedBy => "Validated By",
        }
    }

    pub fn cell(&self, request: &Request) -> String {
        let or_dash = |value: Option<&str>| value.unwrap_or("-").to_owned();
        match self {
            Self::Id => request.id.to_string(),
            Self::Plant => or_dash(request.field("plant")),
            Self::Owner => request.owner.clone(),
            Self::Description => or_dash(
                request.field("new_material_description").or_else(|| request.field("summary")),
            ),
            Self::PartCode => or_dash(request.field("sap_part_code")),
            Self::Submitted => request.submission_date.format("%Y-%m-%d %H:%M").to_string(),
            Self::Status => request.status.to_string(),
            Self::Approver => or_dash(request.approver.as_deref()),
            Self::ReasonForReturn => or_dash(request.reason_for_return.as_deref()),
            Self::Modified => request.modified_date.format("%Y-%m-%d %H:%M").to_string(),
            Self::ValidationStatus => or_dash(request.validation_status.map(|s| s.as_str())),
            Self::ValidatedBy => or_dash(request.validated_by.as_deref()),
        }
    }
}

const LEADING: [Column; 5] =
    [Column::Id, Column::Plant, Column::Owner, Column::Description, Column::PartCode];

pub fn columns(queue: QueueKind) -> Vec<Column> {
    let trailing: &[Column] = match queue {
        QueueKind::Approval => &[Column::Submitted, Column::Status],
        QueueKind::Validation => &[
            Column::Submitted,
            Column::Status,
            Column::Approver,
            Column::Modified,
        ],
        QueueKind::ApprovedHistory
        | QueueKind::ValidatedHistory
        | QueueKind::MyRequests => &[
            Column::Submitted,
            Column::Status,
            Column::Approver,
            Column::ReasonForReturn,
            Column::Modified,
            Column::ValidationStatus,
            Column::ValidatedBy,
        ],
    };
    LEADING.iter().chain(trailing).copied().collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub title: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

impl TableView {
    pub fn build(queue: QueueKind, requests: &[Request]) -> Self {
        let columns = columns(queue);
        Self {
            title: queue.title(),
            headers: columns.iter().map(Column::header).collect(),
            rows: requests
                .iter()
                .map(|request| columns.iter().map(|column| column.cell(request)).collect())
                .collect(),
            empty_message: requests.is_empty().then(|| queue.empty_message()),
        }
    }

    /// Plain fixed-width rendering for terminals.
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.title);
        if let Some(message) = self.empty_message {
            out.push_str(message);
            out.push('\n');
            return out;
        }

        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(index))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        out.push_str(&pad_row(self.headers.iter().copied(), &widths));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&pad_row(row.iter().map(String::as_str), &widths));
            out.push('\n');
        }
        out
    }
}

fn pad_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_owned()
}
