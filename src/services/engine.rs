use crate::services::removal::{BackgroundRemover, RemovalError};
use anyhow::{Context, Result};
use camino::Utf8Path;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use std::io::Cursor;
use std::sync::Mutex;

/// Side length of the square input the u2net model family expects.
const MODEL_INPUT_SIZE: u32 = 320;

const PLANE: usize = (MODEL_INPUT_SIZE * MODEL_INPUT_SIZE) as usize;

// ImageNet normalization constants used when the models were trained.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Loaded segmentation model session.
///
/// This is the opaque model handle the rest of the app passes around
/// (behind [`BackgroundRemover`]). It owns the ONNX Runtime session and
/// adapts image bytes to and from the model's tensor format; everything
/// else about execution is the runtime's business.
///
/// The session sits behind a mutex: one job runs at a time, so there is
/// never contention, but `remove` stays `&self` for the trait object.
pub struct OnnxEngine {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxEngine {
    /// Build a session from a model file on disk.
    ///
    /// This is the expensive step (the u2net weights are ~170 MB); it runs
    /// on the blocking pool from the install task, never the UI thread.
    pub fn new_session(model_path: &Utf8Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_cpus::get().min(4))?
            .commit_from_file(model_path.as_std_path())
            .with_context(|| format!("Failed to load model: {}", model_path))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Model has no inputs")?;

        // The first output of the u2net family is the fused saliency
        // map; the deeper side outputs are training aids.
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .context("Model has no outputs")?;

        tracing::info!(
            "Model session ready: {} (input '{}', output '{}')",
            model_path,
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl BackgroundRemover for OnnxEngine {
    fn remove(&self, input: &[u8]) -> Result<Vec<u8>, RemovalError> {
        let img =
            image::load_from_memory(input).map_err(|e| RemovalError::Decode(e.to_string()))?;

        let tensor_data = normalize_to_tensor(&img);
        let tensor = Tensor::from_array((
            [1usize, 3, MODEL_INPUT_SIZE as usize, MODEL_INPUT_SIZE as usize],
            tensor_data,
        ))
        .map_err(|e| RemovalError::Inference(e.to_string()))?;

        let mut session = self.session.lock().unwrap();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| RemovalError::Inference(e.to_string()))?;

        let (_, saliency) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| RemovalError::Inference(e.to_string()))?;
        if saliency.len() < PLANE {
            return Err(RemovalError::Inference(format!(
                "unexpected output size {} (wanted at least {})",
                saliency.len(),
                PLANE
            )));
        }

        let mask = mask_from_saliency(&saliency[..PLANE]);
        composite_alpha(&img, &mask)
    }
}

/// Resize to the model input and normalize into a CHW float buffer.
fn normalize_to_tensor(img: &DynamicImage) -> Vec<f32> {
    let resized = img
        .resize_exact(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let mut data = vec![0f32; 3 * PLANE];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * MODEL_INPUT_SIZE + x) as usize;
        for channel in 0..3 {
            data[channel * PLANE + offset] =
                (pixel[channel] as f32 / 255.0 - MEAN[channel]) / STD[channel];
        }
    }
    data
}

/// Min-max normalize the raw saliency map into an 8-bit alpha mask.
fn mask_from_saliency(saliency: &[f32]) -> GrayImage {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in saliency {
        min = min.min(v);
        max = max.max(v);
    }
    // Guard against a constant map (range 0) producing NaN
    let range = (max - min).max(1e-6);

    GrayImage::from_fn(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, |x, y| {
        let v = saliency[(y * MODEL_INPUT_SIZE + x) as usize];
        Luma([(((v - min) / range) * 255.0).round() as u8])
    })
}

/// Scale the mask back to the original size, apply it as the alpha
/// channel, and encode the result as PNG.
fn composite_alpha(original: &DynamicImage, mask: &GrayImage) -> Result<Vec<u8>, RemovalError> {
    let (width, height) = (original.width(), original.height());
    let mask = image::imageops::resize(mask, width, height, FilterType::Triangle);

    let mut rgba = original.to_rgba8();
    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        pixel[3] = mask.get_pixel(x, y)[0];
    }

    let mut buffer = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| RemovalError::Encode(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn checker_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn test_normalize_to_tensor_shape() {
        let data = normalize_to_tensor(&checker_image(64, 48));
        assert_eq!(data.len(), 3 * PLANE);
    }

    #[test]
    fn test_normalize_to_tensor_values() {
        // A uniform white image maps every channel to (1 - mean) / std
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, image::Rgb([255; 3])));
        let data = normalize_to_tensor(&white);

        for channel in 0..3 {
            let expected = (1.0 - MEAN[channel]) / STD[channel];
            let actual = data[channel * PLANE];
            assert!((actual - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mask_from_saliency_normalizes_range() {
        let mut saliency = vec![0.25f32; PLANE];
        saliency[0] = 0.75;

        let mask = mask_from_saliency(&saliency);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        assert_eq!(mask.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_mask_from_saliency_constant_input() {
        // A flat map must not divide by zero
        let saliency = vec![0.5f32; PLANE];
        let mask = mask_from_saliency(&saliency);
        assert_eq!(mask.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_composite_alpha_preserves_dimensions() {
        let original = checker_image(40, 30);
        let mask = GrayImage::from_pixel(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, Luma([128]));

        let png = composite_alpha(&original, &mask).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();

        assert_eq!(decoded.width(), 40);
        assert_eq!(decoded.height(), 30);
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0)[3], 128);
    }
}
