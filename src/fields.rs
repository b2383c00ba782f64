use crate::error::PlateFillError;
use crate::types::{Pt, Size};
use std::collections::BTreeMap;

/// The fixed set of template fields. The identifiers mirror the template's
/// blank lines; the coordinate table below is hand-tuned against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    CompanyLine,
    RepresentativeLine,
    TrainingLine,
    DurationLine,
    DatesLine,
    LocationLine,
    InstructorLine,
    ParticipantsLine,
    AmountHtLine,
    TvaLine,
    AmountTtcLine,
    ClosingLine,
    ClientNameLine,
    ClientRoleLine,
}

impl FieldId {
    pub const ALL: [FieldId; 14] = [
        FieldId::CompanyLine,
        FieldId::RepresentativeLine,
        FieldId::TrainingLine,
        FieldId::DurationLine,
        FieldId::DatesLine,
        FieldId::LocationLine,
        FieldId::InstructorLine,
        FieldId::ParticipantsLine,
        FieldId::AmountHtLine,
        FieldId::TvaLine,
        FieldId::AmountTtcLine,
        FieldId::ClosingLine,
        FieldId::ClientNameLine,
        FieldId::ClientRoleLine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::CompanyLine => "companyLine",
            FieldId::RepresentativeLine => "representativeLine",
            FieldId::TrainingLine => "trainingLine",
            FieldId::DurationLine => "durationLine",
            FieldId::DatesLine => "datesLine",
            FieldId::LocationLine => "locationLine",
            FieldId::InstructorLine => "instructorLine",
            FieldId::ParticipantsLine => "participantsLine",
            FieldId::AmountHtLine => "amountHtLine",
            FieldId::TvaLine => "tvaLine",
            FieldId::AmountTtcLine => "amountTtcLine",
            FieldId::ClosingLine => "closingLine",
            FieldId::ClientNameLine => "clientNameLine",
            FieldId::ClientRoleLine => "clientRoleLine",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        FieldId::ALL.into_iter().find(|id| id.as_str() == raw)
    }
}

/// Geometry and formatting for one field: page, top-left anchor (distance
/// from the page's top edge), box height, and wrapping limits.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub page_index: usize,
    pub x: Pt,
    pub top: Pt,
    pub box_height: Pt,
    pub font_size: Pt,
    /// Wrap bound. When absent the page width minus the anchor and a fixed
    /// 40pt right margin applies.
    pub max_width: Option<Pt>,
    /// Explicit clearing width; same page-width fallback as `max_width`.
    pub clear_width: Option<Pt>,
    /// Baseline step between wrapped lines; defaults to `font_size + 2`.
    pub line_height: Option<Pt>,
    pub max_lines: usize,
}

impl FieldSpec {
    /// A default single-line entry: 9pt text in a 9.1pt box.
    pub fn line(page_index: usize, x: f32, top: f32) -> Self {
        Self {
            page_index,
            x: Pt::from_f32(x),
            top: Pt::from_f32(top),
            box_height: Pt::from_f32(9.1),
            font_size: Pt::from_i32(9),
            max_width: Some(Pt::from_i32(480)),
            clear_width: None,
            line_height: None,
            max_lines: 1,
        }
    }

    pub fn with_wrapping(mut self, line_height: f32, max_lines: usize) -> Self {
        self.line_height = Some(Pt::from_f32(line_height));
        self.max_lines = max_lines;
        self
    }

    pub fn resolved_line_height(&self) -> Pt {
        self.line_height
            .unwrap_or(self.font_size + Pt::from_i32(2))
    }

    pub fn resolved_max_width(&self, page: Size) -> Pt {
        self.max_width
            .unwrap_or(page.width - self.x - Pt::from_i32(40))
    }

    pub fn resolved_clear_width(&self, page: Size) -> Pt {
        self.clear_width
            .unwrap_or(page.width - self.x - Pt::from_i32(40))
    }
}

/// Anchor and target width for the signature raster; the drawn height is
/// derived from the source image's aspect ratio.
#[derive(Debug, Clone)]
pub struct SignaturePlacement {
    pub page_index: usize,
    pub x: Pt,
    pub top: Pt,
    pub target_width: Pt,
}

impl SignaturePlacement {
    /// Scales the native pixel size to the target width, preserving aspect
    /// ratio.
    pub fn scaled_size(&self, native_width: u32, native_height: u32) -> Size {
        if native_width == 0 {
            return Size {
                width: self.target_width,
                height: Pt::ZERO,
            };
        }
        let scale = self.target_width.to_f32() / native_width as f32;
        Size {
            width: self.target_width,
            height: Pt::from_f32(native_height as f32 * scale),
        }
    }
}

/// The declarative coordinate table coupling field identifiers to one
/// specific template. Rendering walks `entries` in order; a template change
/// requires re-authoring this table.
#[derive(Debug, Clone)]
pub struct PlacementTable {
    pub entries: Vec<(FieldId, FieldSpec)>,
    pub signature: SignaturePlacement,
}

impl PlacementTable {
    /// Coordinates for the French training-convention template the crate
    /// ships against: three pages, 14 text lines, one signature block.
    pub fn convention_fr() -> Self {
        let entries = vec![
            (
                FieldId::CompanyLine,
                FieldSpec::line(0, 42.52, 302.1).with_wrapping(11.0, 2),
            ),
            (FieldId::RepresentativeLine, FieldSpec::line(0, 42.52, 347.46)),
            (FieldId::TrainingLine, FieldSpec::line(0, 42.52, 503.36)),
            (FieldId::DurationLine, FieldSpec::line(0, 56.69, 681.95)),
            (FieldId::DatesLine, FieldSpec::line(0, 56.69, 704.62)),
            (FieldId::LocationLine, FieldSpec::line(0, 56.69, 727.3)),
            (FieldId::InstructorLine, FieldSpec::line(0, 56.69, 749.98)),
            (
                FieldId::ParticipantsLine,
                FieldSpec::line(1, 56.69, 75.33).with_wrapping(11.0, 3),
            ),
            (FieldId::AmountHtLine, FieldSpec::line(1, 56.69, 177.38)),
            (FieldId::TvaLine, FieldSpec::line(1, 56.69, 200.06)),
            (FieldId::AmountTtcLine, FieldSpec::line(1, 56.69, 222.73)),
            (FieldId::ClosingLine, FieldSpec::line(1, 42.52, 506.2)),
            (FieldId::ClientNameLine, FieldSpec::line(1, 42.52, 560.06)),
            (FieldId::ClientRoleLine, FieldSpec::line(1, 42.52, 582.73)),
        ];
        Self {
            entries,
            signature: SignaturePlacement {
                page_index: 2,
                x: Pt::from_i32(120),
                top: Pt::from_f32(35.65),
                target_width: Pt::from_i32(180),
            },
        }
    }

    pub fn get(&self, field: FieldId) -> Option<&FieldSpec> {
        self.entries
            .iter()
            .find(|(id, _)| *id == field)
            .map(|(_, spec)| spec)
    }

    /// Fail-fast validation run once at startup, before any rendering:
    /// every referenced page must exist in the template and every entry must
    /// allow at least one line.
    pub fn validate(&self, page_count: usize) -> Result<(), PlateFillError> {
        if self.entries.is_empty() {
            return Err(PlateFillError::InvalidConfiguration(
                "placement table has no fields".to_string(),
            ));
        }
        for (field, spec) in &self.entries {
            if spec.page_index >= page_count {
                return Err(PlateFillError::InvalidConfiguration(format!(
                    "field {} page index out of range: {} (template has {} pages)",
                    field.as_str(),
                    spec.page_index,
                    page_count
                )));
            }
            if spec.max_lines == 0 {
                return Err(PlateFillError::InvalidConfiguration(format!(
                    "field {} must allow at least one line",
                    field.as_str()
                )));
            }
        }
        if self.signature.page_index >= page_count {
            return Err(PlateFillError::InvalidConfiguration(format!(
                "signature page index out of range: {} (template has {} pages)",
                self.signature.page_index, page_count
            )));
        }
        Ok(())
    }
}

/// The caller-built mapping of field identifiers to pre-formatted display
/// strings. No business formatting happens past this point.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    values: BTreeMap<FieldId, String>,
}

impl RenderRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: FieldId, value: impl Into<String>) -> &mut Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn get(&self, field: FieldId) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
