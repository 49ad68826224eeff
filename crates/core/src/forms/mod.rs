//! Declarative form schemas for request creation and resubmission.
//!
//! One schema per request function. Option lists are data, so the CLI and the
//! backend validate against the same tables.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::function::RequestFunction;
use crate::domain::request::RequestFields;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

const fn opt(value: &'static str, label: &'static str) -> SelectOption {
    SelectOption { value, label }
}

pub const PLANTS: &[SelectOption] = &[
    opt("BP01", "BP01"),
    opt("BP02", "BP02"),
    opt("BP03", "BP03"),
    opt("BP04", "BP04"),
    opt("BP05", "BP05"),
    opt("BP06", "BP06"),
    opt("BP07", "BP07"),
    opt("BP08", "BP08"),
    opt("BP09", "BP09"),
    opt("BP10", "BP10"),
    opt("BP11", "BP11"),
    opt("BP12", "BP12"),
    opt("BP13", "BP13"),
    opt("BP14", "BP14"),
    opt("AM01", "AM01"),
    opt("AV01", "AV01"),
    opt("EA01", "EA01"),
    opt("SY01", "SY01"),
];

pub const SALES_VIEWS: &[SelectOption] = &[
    opt("DOM", "Domestic Sales"),
    opt("EXP", "Export"),
    opt("SUB", "Sub Contract"),
    opt("STO", "Stock Transfer"),
];

pub const TAX_INDICATIONS: &[SelectOption] =
    &[opt("0", "0 - Taxable Under GST"), opt("1", "1 - GST - Exempted")];

pub const PROCUREMENT_TYPES: &[SelectOption] = &[
    opt("E", "E - In-house Production"),
    opt("F", "F - External Procurement"),
    opt("F-30", "F-30 - Special Procurement"),
];

pub const PRODUCTION_VERSIONS: &[SelectOption] = &[opt("REM", "REM")];

pub const QUALITY_MANAGEMENT: &[SelectOption] =
    &[opt("PUR", "Purchasing"), opt("PROD", "Production")];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextArea,
    Select(&'static [SelectOption]),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    const fn text(name: &'static str, label: &'static str, required: bool) -> Self {
        Self { name, label, kind: FieldKind::Text, required }
    }

    const fn select(
        name: &'static str,
        label: &'static str,
        options: &'static [SelectOption],
        required: bool,
    ) -> Self {
        Self { name, label, kind: FieldKind::Select(options), required }
    }

    fn check(&self, value: Option<&str>) -> Option<FieldProblem> {
        match value {
            None if self.required => Some(FieldProblem::Missing { field: self.name.to_owned() }),
            None => None,
            Some(value) => match &self.kind {
                FieldKind::Select(options) if !options.iter().any(|o| o.value == value) => {
                    Some(FieldProblem::NotAnOption {
                        field: self.name.to_owned(),
                        value: value.to_owned(),
                    })
                }
                _ => None,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormSchema {
    pub function: RequestFunction,
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn for_function(function: RequestFunction) -> Result<Self, FormError> {
        match function {
            RequestFunction::PartCodeModification => Ok(part_code_modification()),
            other => Err(FormError::UnsupportedFunction(other)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Checks `fields` against the schema and returns the normalized values:
    /// trimmed, with blank optional entries dropped.
    pub fn validate(&self, fields: &RequestFields) -> Result<RequestFields, FormError> {
        let mut problems = Vec::new();

        for name in fields.keys() {
            if self.field(name).is_none() {
                problems.push(FieldProblem::Unknown { field: name.clone() });
            }
        }

        let mut normalized = RequestFields::new();
        for spec in &self.fields {
            let value = fields.get(spec.name).map(|value| value.trim()).filter(|v| !v.is_empty());
            if let Some(problem) = spec.check(value) {
                problems.push(problem);
            } else if let Some(value) = value {
                normalized.insert(spec.name.to_owned(), value.to_owned());
            }
        }

        if problems.is_empty() {
            Ok(normalized)
        } else {
            Err(FormError::Invalid(problems))
        }
    }
}

fn part_code_modification() -> FormSchema {
    FormSchema {
        function: RequestFunction::PartCodeModification,
        fields: vec![
            FieldSpec::select("plant", "Plant", PLANTS, true),
            FieldSpec::text("sap_part_code", "SAP Part Code", true),
            FieldSpec::text("new_material_description", "New Material Description", true),
            FieldSpec::text("hsn_code", "HSN Code", false),
            FieldSpec::text("from_state_to_state", "From State - To State", false),
            FieldSpec::text("tax", "Tax %", false),
            FieldSpec::select("sales_views", "Sales Views", SALES_VIEWS, false),
            FieldSpec::select("supplying_plant", "Supplying Plant", PLANTS, false),
            FieldSpec::select("receiving_plant", "Receiving Plant", PLANTS, true),
            FieldSpec::select(
                "tax_indication_of_the_material",
                "Tax Indication of the Material",
                TAX_INDICATIONS,
                false,
            ),
            FieldSpec::select("procurement_type", "Procurement Type", PROCUREMENT_TYPES, false),
            FieldSpec::text("activate_storage_location", "Activate Storage Location", false),
            FieldSpec::select(
                "production_version_update",
                "Production Version Update",
                PRODUCTION_VERSIONS,
                false,
            ),
            FieldSpec::select(
                "quality_management",
                "Quality Management",
                QUALITY_MANAGEMENT,
                false,
            ),
            FieldSpec {
                name: "remarks",
                label: "Detailed Query Remarks",
                kind: FieldKind::TextArea,
                required: true,
            },
        ],
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FieldProblem {
    Missing { field: String },
    NotAnOption { field: String, value: String },
    Unknown { field: String },
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "`{field}` is required"),
            Self::NotAnOption { field, value } => {
                write!(f, "`{value}` is not a valid option for `{field}`")
            }
            Self::Unknown { field } => write!(f, "`{field}` is not part of this form"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("no form is registered for {0}")]
    UnsupportedFunction(RequestFunction),
    #[error("invalid form: {}", join_problems(.0))]
    Invalid(Vec<FieldProblem>),
}

fn join_problems(problems: &[FieldProblem]) -> String {
    problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::{FieldKind, FieldProblem, FormError, FormSchema};
    use crate::domain::function::RequestFunction;
    use crate::domain::request::RequestFields;

    fn valid_fields() -> RequestFields {
        RequestFields::from([
            ("plant".to_owned(), "BP01".to_owned()),
            ("sap_part_code".to_owned(), " 100-200 ".to_owned()),
            ("new_material_description".to_owned(), "Bracket, zinc".to_owned()),
            ("receiving_plant".to_owned(), "AM01".to_owned()),
            ("remarks".to_owned(), "Update description".to_owned()),
            ("hsn_code".to_owned(), "   ".to_owned()),
        ])
    }

    #[test]
    fn part_code_modification_accepts_and_normalizes_values() {
        let schema = FormSchema::for_function(RequestFunction::PartCodeModification)
            .expect("schema registered");
        let normalized = schema.validate(&valid_fields()).expect("valid form");

        assert_eq!(normalized.get("sap_part_code").map(String::as_str), Some("100-200"));
        assert!(!normalized.contains_key("hsn_code"));
    }

    #[test]
    fn validation_reports_every_problem() {
        let schema = FormSchema::for_function(RequestFunction::PartCodeModification)
            .expect("schema registered");
        let mut fields = valid_fields();
        fields.remove("plant");
        fields.insert("procurement_type".to_owned(), "Z".to_owned());
        fields.insert("colour".to_owned(), "blue".to_owned());

        let FormError::Invalid(problems) = schema.validate(&fields).expect_err("invalid") else {
            panic!("expected field problems");
        };
        assert!(problems.contains(&FieldProblem::Missing { field: "plant".to_owned() }));
        assert!(problems.contains(&FieldProblem::NotAnOption {
            field: "procurement_type".to_owned(),
            value: "Z".to_owned(),
        }));
        assert!(problems.contains(&FieldProblem::Unknown { field: "colour".to_owned() }));
    }

    #[test]
    fn plant_select_carries_the_full_option_list() {
        let schema = FormSchema::for_function(RequestFunction::PartCodeModification)
            .expect("schema registered");
        let plant = schema.field("plant").expect("plant field");
        let FieldKind::Select(options) = &plant.kind else {
            panic!("plant is a select");
        };
        assert_eq!(options.len(), 18);
        assert_eq!(options.first().map(|o| o.value), Some("BP01"));
    }

    #[test]
    fn functions_without_schema_are_unsupported() {
        assert_eq!(
            FormSchema::for_function(RequestFunction::HiringIndent),
            Err(FormError::UnsupportedFunction(RequestFunction::HiringIndent))
        );
    }
}
