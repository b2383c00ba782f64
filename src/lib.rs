mod assets;
mod debug;
mod error;
mod fields;
mod font;
mod metrics;
mod raster;
mod stamp;
mod types;
mod winansi;
mod wrap;

pub use assets::{Asset, AssetKind};
pub use error::PlateFillError;
pub use fields::{FieldId, FieldSpec, PlacementTable, RenderRequest, SignaturePlacement};
pub use font::{FontMetrics, FontProgram};
pub use metrics::{FieldMetrics, RenderMetrics};
pub use types::{Pt, Rect, Size};
pub use wrap::{WrappedText, wrap_text};

use debug::RenderLog;
use lopdf::{Document as LoDocument, ObjectId as LoObjectId};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

/// Document Assembler: owns the immutable template and signature bytes, the
/// placement table, and the shared font, and turns a [`RenderRequest`] into
/// a filled PDF byte stream.
///
/// Each render call loads its own document from the template bytes, so
/// concurrent calls share no mutable state. A call either returns a complete
/// byte sequence or fails as a whole; there is no partial output and no
/// retry policy. Rendering is a pure function of its inputs.
#[derive(Debug)]
pub struct TemplateFiller {
    template: Vec<u8>,
    signature: Vec<u8>,
    placement: PlacementTable,
    font: FontMetrics,
    log: Option<RenderLog>,
}

impl TemplateFiller {
    pub fn builder() -> TemplateFillerBuilder {
        TemplateFillerBuilder::default()
    }

    pub fn placement(&self) -> &PlacementTable {
        &self.placement
    }

    pub fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, PlateFillError> {
        self.render_with_metrics(request).map(|(bytes, _)| bytes)
    }

    pub fn render_with_metrics(
        &self,
        request: &RenderRequest,
    ) -> Result<(Vec<u8>, RenderMetrics), PlateFillError> {
        let start = Instant::now();

        // Reject an incomplete request before touching the document: the
        // caller contract requires every field, and there is no partial
        // output mode to fall back to.
        for (field, _) in &self.placement.entries {
            if request.get(*field).is_none() {
                return Err(PlateFillError::MissingField(field.as_str().to_string()));
            }
        }

        let mut doc = LoDocument::load_mem(&self.template)
            .map_err(|err| PlateFillError::Template(format!("unreadable template: {err}")))?;
        if doc.is_encrypted() {
            return Err(PlateFillError::Template(
                "template PDF is encrypted".to_string(),
            ));
        }
        let page_ids: Vec<LoObjectId> = doc.get_pages().values().copied().collect();

        // One font object shared by every field, registered on each page the
        // table touches.
        let font_id = stamp::add_font_object(&mut doc, &self.font)?;
        let touched: BTreeSet<usize> = self
            .placement
            .entries
            .iter()
            .map(|(_, spec)| spec.page_index)
            .collect();
        for page_index in touched {
            let page_id = *page_ids.get(page_index).ok_or_else(|| {
                PlateFillError::InvalidConfiguration(format!(
                    "placement page index out of range: {} (template has {} pages)",
                    page_index,
                    page_ids.len()
                ))
            })?;
            stamp::ensure_page_resource(&mut doc, page_id, b"Font", stamp::FONT_RESOURCE, font_id)?;
        }

        let mut metrics = RenderMetrics::default();
        for (field, spec) in &self.placement.entries {
            let text = request
                .get(*field)
                .ok_or_else(|| PlateFillError::MissingField(field.as_str().to_string()))?;
            let outcome = stamp::stamp_field(&mut doc, &page_ids, &self.font, *field, spec, text)?;
            if let Some(log) = &self.log {
                log.field(field.as_str(), outcome.lines, outcome.truncated);
            }
            metrics.fields.push(FieldMetrics {
                field: *field,
                lines: outcome.lines,
                truncated: outcome.truncated,
            });
        }

        let image = raster::decode_image(&self.signature)?;
        raster::place_signature(&mut doc, &page_ids, &self.placement.signature, &image)?;
        metrics.signature_placed = true;
        if let Some(log) = &self.log {
            let drawn = self
                .placement
                .signature
                .scaled_size(image.width, image.height);
            log.signature(
                self.placement.signature.page_index,
                drawn.width.to_f32(),
                drawn.height.to_f32(),
            );
        }

        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();
        let mut out = Vec::new();
        doc.save_to(&mut out)?;

        metrics.render_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics.output_bytes = out.len();
        if let Some(log) = &self.log {
            log.summary(metrics.fields.len(), metrics.output_bytes, metrics.render_ms);
        }
        Ok((out, metrics))
    }
}

#[derive(Default)]
pub struct TemplateFillerBuilder {
    template: Option<Asset>,
    template_sha256: Option<String>,
    signature: Option<Asset>,
    placement: Option<PlacementTable>,
    font: Option<FontMetrics>,
    font_asset: Option<Asset>,
    debug_log_path: Option<PathBuf>,
}

impl TemplateFillerBuilder {
    pub fn template(mut self, asset: Asset) -> Self {
        self.template = Some(asset);
        self
    }

    pub fn template_bytes(self, data: Vec<u8>) -> Self {
        self.template(Asset::from_bytes(AssetKind::Template, "template", data))
    }

    /// Pins the template bytes to a digest so a silently swapped template
    /// (whose geometry the placement table no longer matches) fails fast.
    pub fn template_sha256(mut self, digest: impl Into<String>) -> Self {
        self.template_sha256 = Some(digest.into());
        self
    }

    pub fn signature(mut self, asset: Asset) -> Self {
        self.signature = Some(asset);
        self
    }

    pub fn signature_bytes(self, data: Vec<u8>) -> Self {
        self.signature(Asset::from_bytes(AssetKind::Signature, "signature", data))
    }

    /// Defaults to [`PlacementTable::convention_fr`].
    pub fn placement(mut self, table: PlacementTable) -> Self {
        self.placement = Some(table);
        self
    }

    /// Defaults to [`FontMetrics::helvetica`].
    pub fn font(mut self, font: FontMetrics) -> Self {
        self.font = Some(font);
        self
    }

    /// A TrueType/OpenType font program to derive metrics from and embed in
    /// the output, for templates tuned against a face other than Helvetica.
    pub fn font_asset(mut self, asset: Asset) -> Self {
        self.font_asset = Some(asset);
        self
    }

    pub fn debug_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log_path = Some(path.into());
        self
    }

    /// Validates the whole configuration up front: asset kinds, optional
    /// digest pin, template parsability, and every placement page index
    /// against the template's page count. Configuration problems surface
    /// here, not mid-render.
    pub fn build(self) -> Result<TemplateFiller, PlateFillError> {
        let template = self.template.ok_or_else(|| {
            PlateFillError::InvalidConfiguration("a template asset is required".to_string())
        })?;
        if template.kind != AssetKind::Template {
            return Err(PlateFillError::InvalidConfiguration(format!(
                "template asset has kind {}",
                template.kind.as_str()
            )));
        }
        if let Some(digest) = &self.template_sha256 {
            template.verify_sha256(digest)?;
        }

        let signature = self.signature.ok_or_else(|| {
            PlateFillError::InvalidConfiguration("a signature asset is required".to_string())
        })?;
        if signature.kind != AssetKind::Signature {
            return Err(PlateFillError::InvalidConfiguration(format!(
                "signature asset has kind {}",
                signature.kind.as_str()
            )));
        }

        let probe = LoDocument::load_mem(&template.data)
            .map_err(|err| PlateFillError::Template(format!("unreadable template: {err}")))?;
        if probe.is_encrypted() {
            return Err(PlateFillError::Template(
                "template PDF is encrypted".to_string(),
            ));
        }
        let page_count = probe.get_pages().len();

        let placement = self
            .placement
            .unwrap_or_else(PlacementTable::convention_fr);
        placement.validate(page_count)?;

        let font = match (self.font, self.font_asset) {
            (Some(_), Some(_)) => {
                return Err(PlateFillError::InvalidConfiguration(
                    "both a font and a font asset were provided".to_string(),
                ));
            }
            (Some(font), None) => font,
            (None, Some(Asset { name, kind, data })) => {
                if kind != AssetKind::Font {
                    return Err(PlateFillError::InvalidConfiguration(format!(
                        "font asset has kind {}",
                        kind.as_str()
                    )));
                }
                FontMetrics::from_ttf_bytes(data, Some(&name))?
            }
            (None, None) => FontMetrics::helvetica(),
        };

        let log = match self.debug_log_path {
            Some(path) => Some(RenderLog::create(path)?),
            None => None,
        };

        Ok(TemplateFiller {
            template: template.data,
            signature: signature.data,
            placement,
            font,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object as LoObject, Stream as LoStream, dictionary};
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_template_pdf(page_count: usize) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<LoObject> = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let content = format!("BT /F1 18 Tf 72 720 Td (PAGE {}) Tj ET", index + 1).into_bytes();
            let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.28f32.into(), 841.89f32.into()],
            });
            kids.push(page_id.into());
        }
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        };
        doc.objects.insert(pages_id, LoObject::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save template");
        out
    }

    fn signature_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(40, 10, image::Rgba([0, 0, 0, 200]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .expect("encode png");
        out
    }

    fn full_request() -> RenderRequest {
        let mut request = RenderRequest::new();
        request
            .set(
                FieldId::CompanyLine,
                "Et : Exemple Formation Conseil SARL, dont le siège social est situé à 10 rue \
                 de la Paix, 75002 Paris, représentée par sa direction générale",
            )
            .set(
                FieldId::RepresentativeLine,
                "Jeanne Martin en qualité de Directrice générale.",
            )
            .set(FieldId::TrainingLine, "Rust niveau avance")
            .set(FieldId::DurationLine, "• Durée de la formation : 3 jours.")
            .set(
                FieldId::DatesLine,
                "• Dates de formation : 12 janvier 2026 au 14 janvier 2026.",
            )
            .set(FieldId::LocationLine, "• Lieu de la formation : Paris.")
            .set(FieldId::InstructorLine, "• Intervenant : A. Dupont")
            .set(FieldId::ParticipantsLine, "• B. Durand, C. Petit, D. Moreau")
            .set(FieldId::AmountHtLine, "• Montant HT : 1 200 euros")
            .set(FieldId::TvaLine, "• TVA (20%) : 240,00 euros")
            .set(FieldId::AmountTtcLine, "• Montant TTC : 1 440,00 euros")
            .set(
                FieldId::ClosingLine,
                "Fait en 2 exemplaires, à PARIS, le 2026-01-05",
            )
            .set(FieldId::ClientNameLine, "Nom : Jeanne Martin")
            .set(FieldId::ClientRoleLine, "Fonction : Directrice générale");
        request
    }

    fn filler() -> TemplateFiller {
        TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .signature_bytes(signature_png())
            .build()
            .expect("build filler")
    }

    fn page_content_plain(doc: &LoDocument, page_id: LoObjectId) -> Vec<u8> {
        let page = doc
            .get_object(page_id)
            .and_then(LoObject::as_dict)
            .expect("page dict");
        let mut stream_ids = Vec::new();
        match page.get(b"Contents").expect("contents") {
            LoObject::Reference(id) => stream_ids.push(*id),
            LoObject::Array(items) => {
                for item in items {
                    stream_ids.push(item.as_reference().expect("content ref"));
                }
            }
            other => panic!("unexpected contents object: {other:?}"),
        }
        let mut out = Vec::new();
        for id in stream_ids {
            let stream = doc
                .get_object(id)
                .and_then(LoObject::as_stream)
                .expect("content stream");
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            out.extend_from_slice(&data);
            out.push(b'\n');
        }
        out
    }

    fn count_token(haystack: &[u8], token: &[u8]) -> usize {
        if token.is_empty() || haystack.len() < token.len() {
            return 0;
        }
        haystack
            .windows(token.len())
            .filter(|window| *window == token)
            .count()
    }

    fn temp_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "platefill_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn render_fills_every_field_and_places_the_signature() {
        let (bytes, metrics) = filler()
            .render_with_metrics(&full_request())
            .expect("render");
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(metrics.fields.len(), 14);
        assert!(metrics.signature_placed);
        assert_eq!(metrics.output_bytes, bytes.len());

        let out = LoDocument::load_mem(&bytes).expect("load output");
        let page_ids: Vec<LoObjectId> = out.get_pages().values().copied().collect();
        assert_eq!(page_ids.len(), 3);

        // Page one carries the seven first-page fields; the company line is
        // long enough to wrap to two lines, so eight Tj operators plus the
        // template's own PAGE marker.
        let first = page_content_plain(&out, page_ids[0]);
        assert_eq!(count_token(&first, b" Tj"), 9);
        assert_eq!(count_token(&first, b"1 1 1 rg"), 7);
        assert_eq!(count_token(&first, b"Rust niveau avance"), 1);

        // The signature lands on page three as an XObject draw.
        let third = page_content_plain(&out, page_ids[2]);
        assert_eq!(count_token(&third, b"/PFsig Do"), 1);
    }

    #[test]
    fn rendering_twice_is_byte_identical() {
        let filler = filler();
        let request = full_request();
        let a = filler.render(&request).expect("first render");
        let b = filler.render(&request).expect("second render");
        assert_eq!(a, b);
    }

    #[test]
    fn missing_field_rejects_the_whole_render() {
        let complete = full_request();
        let mut request = RenderRequest::new();
        for id in FieldId::ALL {
            if id == FieldId::TrainingLine {
                continue;
            }
            request.set(id, complete.get(id).expect("field present"));
        }
        let err = filler().render(&request).expect_err("must fail");
        assert!(matches!(err, PlateFillError::MissingField(_)));
        assert!(err.to_string().contains("trainingLine"));
    }

    #[test]
    fn builder_rejects_templates_shorter_than_the_table() {
        let err = TemplateFiller::builder()
            .template_bytes(make_template_pdf(1))
            .signature_bytes(signature_png())
            .build()
            .expect_err("one page cannot fit the table");
        assert!(matches!(err, PlateFillError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("page index out of range"));
    }

    #[test]
    fn builder_requires_both_assets() {
        let err = TemplateFiller::builder()
            .signature_bytes(signature_png())
            .build()
            .expect_err("no template");
        assert!(err.to_string().contains("template asset is required"));

        let err = TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .build()
            .expect_err("no signature");
        assert!(err.to_string().contains("signature asset is required"));
    }

    #[test]
    fn builder_rejects_garbage_template_bytes() {
        let err = TemplateFiller::builder()
            .template_bytes(b"this is not a pdf".to_vec())
            .signature_bytes(signature_png())
            .build()
            .expect_err("must fail");
        assert!(matches!(err, PlateFillError::Template(_)));
    }

    #[test]
    fn malformed_signature_fails_the_render_with_no_output() {
        let filler = TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .signature_bytes(b"not an image".to_vec())
            .build()
            .expect("signature is only decoded at render time");
        let err = filler.render(&full_request()).expect_err("must fail");
        assert!(matches!(err, PlateFillError::Image(_)));
    }

    #[test]
    fn template_digest_pinning_detects_drift() {
        let template = make_template_pdf(3);
        let digest = Asset::from_bytes(AssetKind::Template, "t", template.clone()).sha256_hex();

        TemplateFiller::builder()
            .template_bytes(template.clone())
            .template_sha256(&digest)
            .signature_bytes(signature_png())
            .build()
            .expect("matching digest");

        let err = TemplateFiller::builder()
            .template_bytes(make_template_pdf(4))
            .template_sha256(&digest)
            .signature_bytes(signature_png())
            .build()
            .expect_err("drifted template");
        assert!(err.to_string().contains("digest mismatch"));
    }

    #[test]
    fn a_truetype_font_asset_is_embedded_in_the_output() {
        let filler = TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .signature_bytes(signature_png())
            .font_asset(Asset::from_bytes(
                AssetKind::Font,
                "Tiny",
                crate::font::minimal_truetype_bytes(),
            ))
            .build()
            .expect("build");
        let bytes = filler.render(&full_request()).expect("render");

        let out = LoDocument::load_mem(&bytes).expect("load output");
        let embedded = out
            .objects
            .values()
            .any(|obj| obj.as_dict().map(|d| d.has(b"FontFile2")).unwrap_or(false));
        assert!(embedded);
    }

    #[test]
    fn font_asset_of_the_wrong_kind_is_rejected() {
        let err = TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .signature_bytes(signature_png())
            .font_asset(Asset::from_bytes(AssetKind::Signature, "sig.png", vec![1, 2, 3]))
            .build()
            .expect_err("must fail");
        assert!(err.to_string().contains("font asset has kind signature"));

        let err = TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .signature_bytes(signature_png())
            .font(FontMetrics::helvetica())
            .font_asset(Asset::from_bytes(
                AssetKind::Font,
                "Tiny",
                crate::font::minimal_truetype_bytes(),
            ))
            .build()
            .expect_err("must fail");
        assert!(err.to_string().contains("both a font and a font asset"));
    }

    #[test]
    fn empty_field_clears_its_box_but_draws_no_text() {
        let mut table = PlacementTable::convention_fr();
        table.entries.retain(|(id, _)| *id == FieldId::ParticipantsLine);
        let filler = TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .signature_bytes(signature_png())
            .placement(table)
            .build()
            .expect("build");

        let mut request = RenderRequest::new();
        request.set(FieldId::ParticipantsLine, "");
        let bytes = filler.render(&request).expect("render");

        let out = LoDocument::load_mem(&bytes).expect("load output");
        let page_ids: Vec<LoObjectId> = out.get_pages().values().copied().collect();
        let second = page_content_plain(&out, page_ids[1]);
        // The clearing rectangle is painted, the template's own marker text
        // survives, and no field text was added.
        assert_eq!(count_token(&second, b"1 1 1 rg"), 1);
        assert_eq!(count_token(&second, b" Tj"), 1);
        assert_eq!(count_token(&second, b"PAGE 2"), 1);
    }

    #[test]
    fn truncated_fields_surface_in_metrics() {
        let long_participants = format!("• {}", vec!["Participant Exemple"; 30].join(", "));
        let mut request = full_request();
        request.set(FieldId::ParticipantsLine, long_participants);
        let (_, metrics) = filler()
            .render_with_metrics(&request)
            .expect("render");
        let truncated: Vec<FieldId> = metrics.truncated_fields().collect();
        assert_eq!(truncated, vec![FieldId::ParticipantsLine]);
        let participants = metrics
            .fields
            .iter()
            .find(|f| f.field == FieldId::ParticipantsLine)
            .expect("participants metrics");
        assert_eq!(participants.lines, 3);
    }

    #[test]
    fn debug_log_records_fields_and_summary() {
        let path = temp_path("render_log");
        let filler = TemplateFiller::builder()
            .template_bytes(make_template_pdf(3))
            .signature_bytes(signature_png())
            .debug_log_path(&path)
            .build()
            .expect("build");
        filler.render(&full_request()).expect("render");

        let log = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(log.matches("\"type\":\"field\"").count(), 14);
        assert_eq!(log.matches("\"type\":\"signature\"").count(), 1);
        assert_eq!(log.matches("\"type\":\"summary\"").count(), 1);
        assert!(log.contains("\"id\":\"companyLine\""));
        let _ = std::fs::remove_file(&path);
    }
}
