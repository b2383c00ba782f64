//! Region Renderer: clears one field's template rectangle and draws its
//! wrapped lines by appending a content stream to the target page.

use crate::error::{PlateFillError, pdf_err};
use crate::fields::{FieldId, FieldSpec};
use crate::font::{FontMetrics, FontProgram};
use crate::types::{Pt, Rect, Size};
use crate::winansi;
use crate::wrap::{WrappedText, wrap_text};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, dictionary};

pub(crate) const FONT_RESOURCE: &str = "PFfont";

#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldStamp {
    pub lines: usize,
    pub truncated: bool,
}

/// Page size from CropBox/MediaBox, resolving one level of Pages-node
/// inheritance. Letter is the last resort.
pub(crate) fn page_size_of(doc: &LoDocument, page_id: LoObjectId) -> Size {
    let Ok(page) = doc.get_object(page_id).and_then(LoObject::as_dict) else {
        return Size::letter();
    };
    if let Some(size) = box_size(doc, page) {
        return size;
    }
    let parent = page
        .get(b"Parent")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
        .and_then(|id| doc.get_object(id).ok())
        .and_then(|obj| obj.as_dict().ok());
    if let Some(parent) = parent {
        if let Some(size) = box_size(doc, parent) {
            return size;
        }
    }
    Size::letter()
}

fn box_size(doc: &LoDocument, dict: &lopdf::Dictionary) -> Option<Size> {
    for key in [b"CropBox".as_slice(), b"MediaBox".as_slice()] {
        let Ok(obj) = dict.get(key) else {
            continue;
        };
        let arr = match obj {
            LoObject::Array(arr) => arr.clone(),
            LoObject::Reference(id) => doc
                .get_object(*id)
                .ok()
                .and_then(|o| o.as_array().ok())
                .cloned()?,
            _ => continue,
        };
        if arr.len() != 4 {
            continue;
        }
        let mut nums = [0f32; 4];
        let mut ok = true;
        for (slot, obj) in nums.iter_mut().zip(arr.iter()) {
            match obj.as_float() {
                Ok(value) => *slot = value,
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            return Some(Size {
                width: Pt::from_f32((nums[2] - nums[0]).abs()),
                height: Pt::from_f32((nums[3] - nums[1]).abs()),
            });
        }
    }
    None
}

/// Top-down anchor converted to the page's bottom-up baseline.
pub(crate) fn baseline_y(spec: &FieldSpec, page: Size) -> Pt {
    page.height - spec.top - spec.box_height + Pt::from_i32(1)
}

/// The opaque rectangle painted before drawing. It hides whatever the
/// template printed under the field; its height grows with the wrapped line
/// count actually produced (zero lines still clear the base box).
pub(crate) fn clear_rect(spec: &FieldSpec, line_count: usize, page: Size) -> Rect {
    let line_height = spec.resolved_line_height();
    let height = spec.box_height + line_height * (line_count as i32 - 1) + Pt::from_i32(2);
    Rect {
        x: spec.x - Pt::from_i32(1),
        y: baseline_y(spec, page) - Pt::from_i32(1),
        width: spec.resolved_clear_width(page),
        height,
    }
}

/// Clears the field's rectangle and draws its wrapped lines. The appended
/// content is wrapped in q..Q so template graphics state cannot leak in.
/// Invoke exactly once per field per render.
pub(crate) fn stamp_field(
    doc: &mut LoDocument,
    page_ids: &[LoObjectId],
    font: &FontMetrics,
    field: FieldId,
    spec: &FieldSpec,
    text: &str,
) -> Result<FieldStamp, PlateFillError> {
    let page_id = *page_ids.get(spec.page_index).ok_or_else(|| {
        PlateFillError::InvalidConfiguration(format!(
            "field {} page index out of range: {} (template has {} pages)",
            field.as_str(),
            spec.page_index,
            page_ids.len()
        ))
    })?;
    let page = page_size_of(doc, page_id);

    let wrapped: WrappedText = wrap_text(
        font,
        text,
        spec.font_size,
        spec.resolved_max_width(page),
        spec.max_lines,
    );

    let rect = clear_rect(spec, wrapped.lines.len(), page);
    let mut content: Vec<u8> = Vec::with_capacity(256);
    content.extend_from_slice(b"q\n1 1 1 rg\n");
    content.extend_from_slice(
        format!(
            "{} {} {} {} re\nf\n",
            fmt_pt(rect.x),
            fmt_pt(rect.y),
            fmt_pt(rect.width),
            fmt_pt(rect.height)
        )
        .as_bytes(),
    );
    content.extend_from_slice(b"Q\n");

    let base_y = baseline_y(spec, page);
    let line_height = spec.resolved_line_height();
    for (index, line) in wrapped.lines.iter().enumerate() {
        let y = base_y - line_height * index as i32;
        content.extend_from_slice(
            format!(
                "q\nBT\n/{} {} Tf\n0 0 0 rg\n{} {} Td\n",
                FONT_RESOURCE,
                fmt_pt(spec.font_size),
                fmt_pt(spec.x),
                fmt_pt(y)
            )
            .as_bytes(),
        );
        push_text_literal(&mut content, line);
        content.extend_from_slice(b" Tj\nET\nQ\n");
    }

    doc.add_page_contents(page_id, content).map_err(pdf_err)?;

    Ok(FieldStamp {
        lines: wrapped.lines.len(),
        truncated: wrapped.truncated,
    })
}

/// Writes the shared font object for the document: a base-14 reference, or
/// an embedded TrueType program with descriptor and WinAnsi widths.
pub(crate) fn add_font_object(
    doc: &mut LoDocument,
    font: &FontMetrics,
) -> Result<LoObjectId, PlateFillError> {
    match &font.program {
        FontProgram::Builtin(base) => Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => LoObject::Name(base.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        })),
        FontProgram::TrueType(data) => {
            let base = sanitize_font_name(&font.name);
            let file_id = doc.add_object(LoStream::new(
                dictionary! { "Length1" => data.len() as i64 },
                data.clone(),
            ));
            // Bit 6 = nonsymbolic, bit 1 = fixed pitch.
            let flags: i64 = 32 | i64::from(font.is_fixed_pitch);
            let (x_min, y_min, x_max, y_max) = font.bbox;
            let descriptor_id = doc.add_object(dictionary! {
                "Type" => "FontDescriptor",
                "FontName" => LoObject::Name(base.as_bytes().to_vec()),
                "Flags" => flags,
                "FontBBox" => vec![
                    (x_min as i64).into(),
                    (y_min as i64).into(),
                    (x_max as i64).into(),
                    (y_max as i64).into(),
                ],
                "ItalicAngle" => font.italic_angle as i64,
                "Ascent" => font.ascent as i64,
                "Descent" => font.descent as i64,
                "CapHeight" => font.cap_height as i64,
                "StemV" => font.stem_v as i64,
                "FontFile2" => file_id,
            });
            let widths: Vec<LoObject> = font
                .widths()
                .iter()
                .map(|w| (*w as i64).into())
                .collect();
            Ok(doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => LoObject::Name(base.as_bytes().to_vec()),
                "FirstChar" => 32,
                "LastChar" => 255,
                "Widths" => widths,
                "Encoding" => "WinAnsiEncoding",
                "FontDescriptor" => descriptor_id,
            }))
        }
    }
}

/// Registers a named resource on one page, copying inherited resource
/// dictionaries down so the change stays page-local.
pub(crate) fn ensure_page_resource(
    doc: &mut LoDocument,
    page_id: LoObjectId,
    category: &[u8],
    name: &str,
    target: LoObjectId,
) -> Result<(), PlateFillError> {
    let page_dict = doc
        .get_object(page_id)
        .and_then(LoObject::as_dict)
        .map_err(pdf_err)?
        .clone();
    let mut resources = resolved_dict(doc, page_dict.get(b"Resources").ok());
    let mut entries = resolved_dict(doc, resources.get(category).ok());
    entries.set(name.as_bytes().to_vec(), LoObject::Reference(target));
    resources.set(category.to_vec(), LoObject::Dictionary(entries));

    let page_mut = doc
        .get_object_mut(page_id)
        .and_then(LoObject::as_dict_mut)
        .map_err(pdf_err)?;
    page_mut.set("Resources", LoObject::Dictionary(resources));
    Ok(())
}

fn resolved_dict(doc: &LoDocument, obj: Option<&LoObject>) -> lopdf::Dictionary {
    match obj {
        Some(LoObject::Dictionary(d)) => d.clone(),
        Some(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => lopdf::Dictionary::new(),
    }
}

/// (text) literal in WinAnsi bytes with PDF delimiter escaping. Chars the
/// encoding cannot represent draw as '?', consistent with how they measure.
pub(crate) fn push_text_literal(out: &mut Vec<u8>, text: &str) {
    out.push(b'(');
    for ch in text.chars() {
        let byte = winansi::byte_for_char(ch).unwrap_or(b'?');
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

fn fmt_pt(value: Pt) -> String {
    format!("{}", value.to_f32())
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '+')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}
