use crate::{
    classifier::{Classifier, ClassifierError, Prediction},
    config::ModelConfig,
};
use image::{imageops::FilterType, GenericImageView};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::Mutex;

const INPUT_WIDTH: u32 = 150;
const INPUT_HEIGHT: u32 = 150;

/// Decodes an image container and produces the model's expected NHWC input:
/// a (1, 150, 150, 3) tensor with channel values scaled to [0, 1].
fn decode_and_preprocess(image_data: &[u8]) -> Result<Array<f32, Ix4>, ClassifierError> {
    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| ClassifierError::ImageDecode(e.to_string()))?;

    let original_img = image_reader
        .decode()
        .map_err(|e| ClassifierError::ImageDecode(e.to_string()))?;

    let img = original_img.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

    let mut input = Array::zeros((1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize, 3));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }

    Ok(input)
}

pub struct OrtClassifier {
    session: Mutex<Session>,
    output_name: String,
}

impl OrtClassifier {
    pub fn new(model_config: &ModelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_config.get_model_path())?;

        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or("model graph has no outputs")?;

        tracing::info!(
            "Loaded ONNX model from {:?}",
            model_config.get_model_path()
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<f32, ClassifierError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| ClassifierError::Inference(format!("session mutex poisoned: {}", e)))?;

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ClassifierError::Inference(format!("failed to build tensor: {}", e)))?;

        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session
            .run(input_tensor)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let (_, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("failed to extract tensor: {}", e)))?;

        data.first()
            .copied()
            .ok_or_else(|| ClassifierError::Inference("model produced no output".to_string()))
    }
}

impl Classifier for OrtClassifier {
    fn classify(&self, image_data: &[u8]) -> Result<Prediction, ClassifierError> {
        let input = decode_and_preprocess(image_data)?;
        let score = self.run_inference(&input)?;

        tracing::debug!("Raw model score: {:.6}", score);

        Ok(Prediction::from_score(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn encode_png(width: u32, height: u32, color: Rgb<u8>) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, color);
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();

        image_data
    }

    #[test]
    fn test_decode_and_preprocess() {
        let image_data = encode_png(100, 100, Rgb([255, 0, 0]));

        let input = decode_and_preprocess(&image_data).unwrap();

        assert_eq!(input.shape(), &[1, 150, 150, 3]);
        assert!(input.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn preprocess_normalizes_channel_values() {
        let image_data = encode_png(150, 150, Rgb([255, 0, 0]));

        let input = decode_and_preprocess(&image_data).unwrap();

        assert!((input[[0, 75, 75, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(input[[0, 75, 75, 1]], 0.0);
        assert_eq!(input[[0, 75, 75, 2]], 0.0);
    }

    #[test]
    fn preprocess_rejects_non_image_bytes() {
        let result = decode_and_preprocess(b"definitely not an image");

        assert!(matches!(result, Err(ClassifierError::ImageDecode(_))));
    }
}
