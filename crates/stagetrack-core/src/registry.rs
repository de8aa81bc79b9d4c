//! # Stage Registry
//!
//! Static, ordered catalog of the production stages.
//!
//! | # | Stage | Access tag | API path | Code prefix | Links upstream via |
//! |---|-------|------------|----------|-------------|--------------------|
//! | 1 | Register | SMS Register | `/sms-register` | SMS | - |
//! | 2 | Hot Coil | Hot Coil | `/hot-coil` | HC | `sms_short_code` |
//! | 3 | Recoiler | Recoil | `/re-coiler` | RC | `hot_coiler_short_code` |
//! | 4 | Pipe Mill | Pipe Mill | `/pipe-mill` | PM | `recoiler_short_code` |
//! | 5 | QC Lab | QC Lab | `/qc-lab-samples` | QC | `pipe_mill_short_code` |
//! | 6 | Tundish | Tundish | `/tundish-checklist` | TD | `qc_lab_short_code` |
//! | 7 | Ladle | Ladle | `/laddle-checklist` | LD | `tundish_short_code` |
//!
//! Everything here is data. Adding, renaming or reordering a stage is an
//! edit to [`STANDARD_STAGES`] and nothing else: the code deriver, the
//! reconciler and the access gate only ever read descriptors.

use crate::TrackError;
use serde::Serialize;
use std::collections::BTreeSet;

/// Landing view every authenticated user can reach.
pub const DEFAULT_LANDING_STAGE: &str = "Dashboard";

/// Dropdown value that unlocks the companion free-text field.
pub const OTHER_OPTION: &str = "Other";

// =============================================================================
// DESCRIPTOR TYPES
// =============================================================================

/// One selectable value of a dropdown, with its English and Hindi labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DropdownOption {
    pub value: &'static str,
    pub label: &'static str,
    pub localized_label: &'static str,
}

impl DropdownOption {
    #[must_use]
    pub const fn new(value: &'static str, label: &'static str, localized_label: &'static str) -> Self {
        Self {
            value,
            label,
            localized_label,
        }
    }
}

/// The option set of one form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DropdownSet {
    /// Field the dropdown fills.
    pub field: &'static str,
    pub options: &'static [DropdownOption],
    /// Free-text field required when [`OTHER_OPTION`] is selected.
    pub other_field: Option<&'static str>,
}

impl DropdownSet {
    /// Check whether a value is one of the options.
    #[must_use]
    pub fn allows(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// How the fallback code of a stage's records is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeScheme {
    pub prefix: &'static str,
    /// Field supplying the sequence part (`X` when absent).
    pub sequence_field: &'static str,
    /// Field supplying the secondary identifier (`0` when absent).
    pub secondary_field: &'static str,
}

/// Descriptor of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDefinition {
    /// Display and lookup name.
    pub name: &'static str,
    /// Path segment of the stage's CRUD API.
    pub slug: &'static str,
    /// Tag tested against a roster row's step access.
    pub access_tag: &'static str,
    /// Stage whose records this stage consumes, `None` for the first stage.
    pub predecessor: Option<&'static str>,
    /// Field on this stage's records carrying the upstream record's code.
    pub link_field: Option<&'static str>,
    pub code: CodeScheme,
    pub required_fields: &'static [&'static str],
    pub dropdowns: &'static [DropdownSet],
    /// Fields the search box looks at, in display order.
    pub searchable_fields: &'static [&'static str],
    /// Field pre-filled with the session username.
    pub operator_field: Option<&'static str>,
}

impl StageDefinition {
    /// Dropdown descriptor of a field, if that field is a dropdown.
    #[must_use]
    pub fn dropdown(&self, field: &str) -> Option<&DropdownSet> {
        self.dropdowns.iter().find(|d| d.field == field)
    }

    #[must_use]
    pub fn is_required(&self, field: &str) -> bool {
        self.required_fields.contains(&field)
    }
}

// =============================================================================
// OPTION SETS
// =============================================================================

const SHIFT_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Day", "Day", "दिन"),
    DropdownOption::new("Night", "Night", "रात"),
];

const YES_NO_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Yes", "Yes", "हाँ"),
    DropdownOption::new("No", "No", "नहीं"),
];

const DONE_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Done", "Done", "हो गया"),
    DropdownOption::new("Not Done", "Not Done", "नहीं हुआ"),
];

const MILL_INCHARGE_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Lal Babu", "Lal Babu", "लाल बाबू"),
    DropdownOption::new("Bhola", "Bhola", "भोला"),
    DropdownOption::new("Paras Mani", "Paras Mani", "पारस मणि"),
];

const QUALITY_SUPERVISOR_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Durgesh Sahu", "Durgesh Sahu", "दुर्गेश साहू"),
    DropdownOption::new("Yashwant Sahu", "Yashwant Sahu", "यशवंत साहू"),
    DropdownOption::new("Toman Lal Sahu", "Toman Lal Sahu", "तोमन लाल साहू"),
    DropdownOption::new(OTHER_OPTION, "Other", "अन्य"),
];

const ELECTRICAL_DC_OPERATOR_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Hari Tiwari", "Hari Tiwari", "हरि तिवारी"),
    DropdownOption::new("Dhirendra Tripathy", "Dhirendra Tripathy", "धीरेंद्र त्रिपाठी"),
    DropdownOption::new("Dhimendra Rahandale", "Dhimendra Rahandale", "धीमेंद्र रहंडाले"),
    DropdownOption::new("Akhilesh Choudhary", "Akhilesh Choudhary", "अखिलेश चौधरी"),
    DropdownOption::new("Kanhai Kumar Thakur", "Kanhai Kumar Thakur", "कन्हाई कुमार ठाकुर"),
    DropdownOption::new("Shiv Vishwakarma", "Shiv Vishwakarma", "शिव विश्वकर्मा"),
];

const MACHINE_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("SRMPL01", "Recoiler 1", "रिकॉइलर 1"),
    DropdownOption::new("SRMPL02", "Recoiler 2", "रिकॉइलर 2"),
    DropdownOption::new("SRMPL03", "Recoiler 3", "रिकॉइलर 3"),
];

const MILL_NUMBER_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Mill 1", "Mill 1", "मिल 1"),
    DropdownOption::new("Mill 2", "Mill 2", "मिल 2"),
    DropdownOption::new("Mill 3", "Mill 3", "मिल 3"),
    DropdownOption::new("Mill 4", "Mill 4", "मिल 4"),
];

const ITEM_TYPE_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Round", "Round", "गोल"),
    DropdownOption::new("Square", "Square", "चौकोर"),
    DropdownOption::new("Rectangle", "Rectangle", "आयताकार"),
];

const TESTED_BY_OPTIONS: &[DropdownOption] = &[
    DropdownOption::new("Lab Chemist", "Lab Chemist", "लैब केमिस्ट"),
    DropdownOption::new("Shift Chemist", "Shift Chemist", "शिफ्ट केमिस्ट"),
    DropdownOption::new(OTHER_OPTION, "Other", "अन्य"),
];

// =============================================================================
// STANDARD CATALOG
// =============================================================================

/// The seven production stages, in pipeline order.
pub const STANDARD_STAGES: &[StageDefinition] = &[
    StageDefinition {
        name: "Register",
        slug: "sms-register",
        access_tag: "SMS Register",
        predecessor: None,
        link_field: None,
        code: CodeScheme {
            prefix: "SMS",
            sequence_field: "sequence_number",
            secondary_field: "laddle_number",
        },
        required_fields: &[
            "sequence_number",
            "laddle_number",
            "sms_head",
            "furnace_number",
            "temperature",
            "shift_incharge",
        ],
        dropdowns: &[],
        searchable_fields: &[
            "unique_code",
            "created_at",
            "sequence_number",
            "laddle_number",
            "furnace_number",
            "temperature",
        ],
        operator_field: Some("shift_incharge"),
    },
    StageDefinition {
        name: "Hot Coil",
        slug: "hot-coil",
        access_tag: "Hot Coil",
        predecessor: Some("Register"),
        link_field: Some("sms_short_code"),
        code: CodeScheme {
            prefix: "HC",
            sequence_field: "id",
            secondary_field: "size",
        },
        required_fields: &[
            "sms_short_code",
            "size",
            "mill_incharge",
            "quality_supervisor",
            "electrical_dc_operator",
            "strand1_temperature",
            "strand2_temperature",
            "shift_supervisor",
        ],
        dropdowns: &[
            DropdownSet {
                field: "mill_incharge",
                options: MILL_INCHARGE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "quality_supervisor",
                options: QUALITY_SUPERVISOR_OPTIONS,
                other_field: Some("quality_supervisor_other"),
            },
            DropdownSet {
                field: "electrical_dc_operator",
                options: ELECTRICAL_DC_OPERATOR_OPTIONS,
                other_field: None,
            },
        ],
        searchable_fields: &[
            "unique_code",
            "sms_short_code",
            "size",
            "mill_incharge",
            "quality_supervisor",
            "electrical_dc_operator",
            "strand1_temperature",
            "strand2_temperature",
            "shift_supervisor",
            "remarks",
        ],
        operator_field: Some("shift_supervisor"),
    },
    StageDefinition {
        name: "Recoiler",
        slug: "re-coiler",
        access_tag: "Recoil",
        predecessor: Some("Hot Coil"),
        link_field: Some("hot_coiler_short_code"),
        code: CodeScheme {
            prefix: "RC",
            sequence_field: "id",
            secondary_field: "machine_number",
        },
        required_fields: &[
            "hot_coiler_short_code",
            "size",
            "supervisor",
            "incharge",
            "contractor",
            "machine_number",
            "welder_name",
        ],
        dropdowns: &[DropdownSet {
            field: "machine_number",
            options: MACHINE_OPTIONS,
            other_field: None,
        }],
        searchable_fields: &[
            "unique_code",
            "hot_coiler_short_code",
            "size",
            "supervisor",
            "incharge",
            "contractor",
            "machine_number",
            "welder_name",
        ],
        operator_field: Some("supervisor"),
    },
    StageDefinition {
        name: "Pipe Mill",
        slug: "pipe-mill",
        access_tag: "Pipe Mill",
        predecessor: Some("Recoiler"),
        link_field: Some("recoiler_short_code"),
        code: CodeScheme {
            prefix: "PM",
            sequence_field: "id",
            secondary_field: "mill_number",
        },
        required_fields: &[
            "recoiler_short_code",
            "mill_number",
            "section",
            "item_type",
            "quality_supervisor",
            "mill_incharge",
            "forman_name",
            "fitter_name",
            "shift",
            "size",
        ],
        dropdowns: &[
            DropdownSet {
                field: "mill_number",
                options: MILL_NUMBER_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "item_type",
                options: ITEM_TYPE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "quality_supervisor",
                options: QUALITY_SUPERVISOR_OPTIONS,
                other_field: Some("quality_supervisor_other"),
            },
            DropdownSet {
                field: "shift",
                options: SHIFT_OPTIONS,
                other_field: None,
            },
        ],
        searchable_fields: &[
            "unique_code",
            "recoiler_short_code",
            "mill_number",
            "section",
            "item_type",
            "quality_supervisor",
            "mill_incharge",
            "forman_name",
            "fitter_name",
            "shift",
            "size",
            "remarks",
        ],
        operator_field: None,
    },
    StageDefinition {
        name: "QC Lab",
        slug: "qc-lab-samples",
        access_tag: "QC Lab",
        predecessor: Some("Pipe Mill"),
        link_field: Some("pipe_mill_short_code"),
        code: CodeScheme {
            prefix: "QC",
            sequence_field: "sampled_sequence",
            secondary_field: "sampled_laddle_number",
        },
        required_fields: &[
            "pipe_mill_short_code",
            "sampled_furnace_number",
            "sampled_sequence",
            "sampled_laddle_number",
            "shift",
            "final_c",
            "final_mn",
            "final_s",
            "final_p",
            "sample_tested_by",
        ],
        dropdowns: &[
            DropdownSet {
                field: "shift",
                options: SHIFT_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "sample_tested_by",
                options: TESTED_BY_OPTIONS,
                other_field: Some("sample_tested_by_other"),
            },
        ],
        searchable_fields: &[
            "unique_code",
            "pipe_mill_short_code",
            "sampled_furnace_number",
            "sampled_sequence",
            "sampled_laddle_number",
            "shift",
            "sample_tested_by",
            "remarks",
        ],
        operator_field: None,
    },
    StageDefinition {
        name: "Tundish",
        slug: "tundish-checklist",
        access_tag: "Tundish",
        predecessor: Some("QC Lab"),
        link_field: Some("qc_lab_short_code"),
        code: CodeScheme {
            prefix: "TD",
            sequence_field: "id",
            secondary_field: "tundish_number",
        },
        required_fields: &[
            "qc_lab_short_code",
            "tundish_number",
            "nozzle_plate_check",
            "well_block_check",
            "board_proper_set",
            "board_sand_filling",
            "refractory_slag_cleaning",
            "tundish_mession_name",
            "checked_by",
        ],
        dropdowns: &[
            DropdownSet {
                field: "nozzle_plate_check",
                options: DONE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "well_block_check",
                options: DONE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "board_proper_set",
                options: YES_NO_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "board_sand_filling",
                options: YES_NO_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "refractory_slag_cleaning",
                options: DONE_OPTIONS,
                other_field: None,
            },
        ],
        searchable_fields: &[
            "unique_code",
            "qc_lab_short_code",
            "tundish_number",
            "tundish_mession_name",
            "checked_by",
            "remarks",
        ],
        operator_field: Some("checked_by"),
    },
    StageDefinition {
        name: "Ladle",
        slug: "laddle-checklist",
        access_tag: "Ladle",
        predecessor: Some("Tundish"),
        link_field: Some("tundish_short_code"),
        code: CodeScheme {
            prefix: "LD",
            sequence_field: "id",
            secondary_field: "laddle_number",
        },
        required_fields: &[
            "tundish_short_code",
            "laddle_number",
            "slag_cleaning_top",
            "slag_cleaning_bottom",
            "nozzle_proper_lancing",
            "pursing_plug_cleaning",
            "sly_gate_check",
            "plate_life",
            "timber_man_name",
            "laddle_man_name",
            "laddle_foreman_name",
            "supervisor_name",
        ],
        dropdowns: &[
            DropdownSet {
                field: "slag_cleaning_top",
                options: DONE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "slag_cleaning_bottom",
                options: DONE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "nozzle_proper_lancing",
                options: DONE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "pursing_plug_cleaning",
                options: DONE_OPTIONS,
                other_field: None,
            },
            DropdownSet {
                field: "sly_gate_check",
                options: DONE_OPTIONS,
                other_field: None,
            },
        ],
        searchable_fields: &[
            "unique_code",
            "tundish_short_code",
            "laddle_number",
            "plate_life",
            "timber_man_name",
            "laddle_man_name",
            "laddle_foreman_name",
            "supervisor_name",
        ],
        operator_field: Some("supervisor_name"),
    },
];

// =============================================================================
// REGISTRY
// =============================================================================

/// Ordered catalog of stage descriptors plus the landing view.
#[derive(Debug, Clone, Serialize)]
pub struct StageRegistry {
    stages: Vec<StageDefinition>,
    landing: &'static str,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl StageRegistry {
    /// The standard seven-stage production pipeline.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(STANDARD_STAGES.to_vec(), DEFAULT_LANDING_STAGE)
    }

    /// Build a custom catalog. Call [`StageRegistry::validate`] to check it.
    #[must_use]
    pub fn new(stages: Vec<StageDefinition>, landing: &'static str) -> Self {
        Self { stages, landing }
    }

    /// Check the catalog invariants.
    ///
    /// - Stage names, slugs and access tags are unique
    /// - Every predecessor names a stage that appears earlier in the list
    /// - A stage has a link field exactly when it has a predecessor
    pub fn validate(&self) -> Result<(), TrackError> {
        let mut names = BTreeSet::new();
        let mut slugs = BTreeSet::new();
        let mut tags = BTreeSet::new();

        for stage in &self.stages {
            if let Some(predecessor) = stage.predecessor {
                if !names.contains(predecessor) {
                    return Err(TrackError::Config(format!(
                        "stage {} names predecessor {} which does not precede it",
                        stage.name, predecessor
                    )));
                }
            }
            if stage.predecessor.is_some() != stage.link_field.is_some() {
                return Err(TrackError::Config(format!(
                    "stage {} must declare a link field exactly when it has a predecessor",
                    stage.name
                )));
            }
            if !names.insert(stage.name) {
                return Err(TrackError::Config(format!(
                    "duplicate stage name {}",
                    stage.name
                )));
            }
            if !slugs.insert(stage.slug) {
                return Err(TrackError::Config(format!("duplicate slug {}", stage.slug)));
            }
            if !tags.insert(stage.access_tag) {
                return Err(TrackError::Config(format!(
                    "duplicate access tag {}",
                    stage.access_tag
                )));
            }
        }
        Ok(())
    }

    /// All stages in pipeline order.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Stage names in pipeline order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.name)
    }

    /// The landing view.
    #[must_use]
    pub fn landing(&self) -> &'static str {
        self.landing
    }

    /// Look up a stage by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Look up a stage by name or slug, ignoring ASCII case.
    ///
    /// Used at the HTTP and CLI boundaries where users type stage names.
    #[must_use]
    pub fn find(&self, name_or_slug: &str) -> Option<&StageDefinition> {
        let wanted = name_or_slug.trim();
        self.stages
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(wanted) || s.slug.eq_ignore_ascii_case(wanted))
    }

    /// Look up a stage, failing with `UnknownStage`.
    pub fn require(&self, name_or_slug: &str) -> Result<&StageDefinition, TrackError> {
        self.find(name_or_slug)
            .ok_or_else(|| TrackError::UnknownStage(name_or_slug.to_string()))
    }

    /// The stage feeding `name`, if any.
    #[must_use]
    pub fn predecessor_of(&self, name: &str) -> Option<&StageDefinition> {
        self.get(name)
            .and_then(|s| s.predecessor)
            .and_then(|p| self.get(p))
    }

    /// The stage consuming `name`'s records, if any.
    #[must_use]
    pub fn successor_of(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.predecessor == Some(name))
    }

    /// Adjacent (upstream, downstream) pairs in pipeline order.
    pub fn links(&self) -> impl Iterator<Item = (&StageDefinition, &StageDefinition)> + '_ {
        self.stages.iter().filter_map(|downstream| {
            downstream
                .predecessor
                .and_then(|p| self.get(p))
                .map(|upstream| (upstream, downstream))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
