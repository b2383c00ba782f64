//! Image Compositor: decodes the signature raster and places it as an
//! Image XObject on its template page, scaled to the placement's target
//! width with the aspect ratio preserved.

use crate::error::{PlateFillError, pdf_err};
use crate::fields::SignaturePlacement;
use crate::stamp::{ensure_page_resource, page_size_of};
use crate::types::Pt;
use image::GenericImageView;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, dictionary};

const IMAGE_RESOURCE: &str = "PFsig";

#[derive(Debug, Clone)]
pub(crate) struct DecodedImage {
    pub width: u32,
    pub height: u32,
    color_space: &'static str,
    /// JPEG data passes through as DCT; everything else becomes raw RGB
    /// (flate-compressed with the rest of the document on save).
    dct: bool,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

pub(crate) fn decode_image(bytes: &[u8]) -> Result<DecodedImage, PlateFillError> {
    let format = image::guess_format(bytes)
        .map_err(|err| PlateFillError::Image(format!("unrecognized image data: {err}")))?;
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| PlateFillError::Image(format!("decode failed: {err}")))?;
    let (width, height) = decoded.dimensions();

    if format == image::ImageFormat::Jpeg {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "DeviceGray",
            _ => "DeviceRGB",
        };
        return Ok(DecodedImage {
            width,
            height,
            color_space,
            dct: true,
            data: bytes.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Ok(DecodedImage {
        width,
        height,
        color_space: "DeviceRGB",
        dct: false,
        data: rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

/// Draws the signature on its page. No clearing step: the template leaves
/// the signature area blank.
pub(crate) fn place_signature(
    doc: &mut LoDocument,
    page_ids: &[LoObjectId],
    placement: &SignaturePlacement,
    image: &DecodedImage,
) -> Result<(), PlateFillError> {
    let page_id = *page_ids.get(placement.page_index).ok_or_else(|| {
        PlateFillError::InvalidConfiguration(format!(
            "signature page index out of range: {} (template has {} pages)",
            placement.page_index,
            page_ids.len()
        ))
    })?;
    let page = page_size_of(doc, page_id);
    let drawn = placement.scaled_size(image.width, image.height);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => LoObject::Name(image.color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8,
    };
    if image.dct {
        dict.set("Filter", LoObject::Name(b"DCTDecode".to_vec()));
    }
    if let Some(alpha) = &image.alpha {
        let smask_id = doc.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha.clone(),
        ));
        dict.set("SMask", LoObject::Reference(smask_id));
    }
    let image_id = doc.add_object(LoStream::new(dict, image.data.clone()));
    ensure_page_resource(doc, page_id, b"XObject", IMAGE_RESOURCE, image_id)?;

    // Hand-tuned -6 nudge from the reference template; see DESIGN.md.
    let y = page.height - placement.top - drawn.height - Pt::from_i32(6);
    let content = format!(
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        drawn.width.to_f32(),
        drawn.height.to_f32(),
        placement.x.to_f32(),
        y.to_f32(),
        IMAGE_RESOURCE
    );
    doc.add_page_contents(page_id, content.into_bytes())
        .map_err(pdf_err)?;
    Ok(())
}
