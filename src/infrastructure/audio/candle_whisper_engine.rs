use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

use crate::application::ports::{TranscriptionEngine, TranscriptionError};

use super::audio_decoder::decode_to_pcm;

const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";
const MAX_DECODE_TOKENS: usize = 224;
// Inference runs on the CPU, where F16 matmuls are slower than F32
const MODEL_DTYPE: DType = DType::F32;

/// Local Whisper inference through candle.
///
/// Inference runs on a blocking thread and holds the model lock for the
/// whole file, so an inference abandoned by its caller still finishes
/// before the next one starts.
pub struct CandleWhisperEngine {
    runtime: Arc<WhisperRuntime>,
}

struct WhisperRuntime {
    model: Mutex<m::model::Whisper>,
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    mel_filters: Vec<f32>,
    multilingual: bool,
}

impl CandleWhisperEngine {
    pub fn new(model_id: &str) -> Result<Self, TranscriptionError> {
        let device = Device::Cpu;

        tracing::info!(
            device = ?device,
            model = model_id,
            "Initializing Candle Whisper transcription engine"
        );

        let api = Api::new().map_err(|e| TranscriptionError::ModelLoadFailed(e.to_string()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("config.json: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("tokenizer.json: {}", e)))?;
        let weights_path = repo.get("model.safetensors").map_err(|e| {
            TranscriptionError::ModelLoadFailed(format!("model.safetensors: {}", e))
        })?;

        let config_contents = std::fs::read_to_string(&config_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("parse config: {}", e)))?;

        let mel_file = mel_filters_file(&config);
        let mel_repo = api.repo(Repo::new(MEL_FILTERS_REPO.to_string(), RepoType::Model));
        let mel_bytes_path = mel_repo
            .get(mel_file)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("{}: {}", mel_file, e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("tokenizer: {}", e)))?;

        let mel_bytes = std::fs::read(&mel_bytes_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("mel filters: {}", e)))?;
        let mel_filters = read_mel_filters(&mel_bytes, config.num_mel_bins)?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], MODEL_DTYPE, &device)
                .map_err(|e| TranscriptionError::ModelLoadFailed(format!("weights: {}", e)))?
        };

        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("model: {}", e)))?;

        let multilingual = !model_id.ends_with(".en");

        tracing::info!(multilingual, "Candle Whisper engine loaded successfully");

        Ok(Self {
            runtime: Arc::new(WhisperRuntime {
                model: Mutex::new(model),
                tokenizer,
                config,
                device,
                mel_filters,
                multilingual,
            }),
        })
    }
}

#[async_trait]
impl TranscriptionEngine for CandleWhisperEngine {
    fn name(&self) -> &'static str {
        "candle-whisper"
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let runtime = Arc::clone(&self.runtime);
        let audio_path = audio_path.to_path_buf();
        let language = language.to_string();

        tokio::task::spawn_blocking(move || runtime.transcribe_file(audio_path, &language))
            .await
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("inference task: {}", e)))?
    }
}

impl WhisperRuntime {
    fn transcribe_file(
        &self,
        audio_path: PathBuf,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let data = std::fs::read(&audio_path)
            .map_err(|e| TranscriptionError::DecodingFailed(format!("read audio: {}", e)))?;
        let extension = audio_path.extension().and_then(|e| e.to_str());
        let pcm = decode_to_pcm(data, extension)?.samples;

        let language_token = self.language_token(language)?;

        let chunk_samples = m::N_SAMPLES;
        let mut mel_tensors = Vec::new();

        for chunk in pcm.chunks(chunk_samples) {
            let mut samples = chunk.to_vec();
            samples.resize(chunk_samples, 0.0);

            let mel_data = m::audio::pcm_to_mel(&self.config, &samples, &self.mel_filters);
            let n_mel = self.config.num_mel_bins;
            let n_frames = mel_data.len() / n_mel;

            let mel_tensor = Tensor::from_vec(mel_data, (1, n_mel, n_frames), &self.device)
                .and_then(|t| t.to_dtype(MODEL_DTYPE))
                .map_err(inference_error("mel tensor"))?;

            mel_tensors.push(mel_tensor);
        }

        let mut model = self.model.lock().map_err(|_| {
            TranscriptionError::TranscriptionFailed("model lock poisoned".to_string())
        })?;

        let mut segments: Vec<String> = Vec::new();
        for (i, mel_tensor) in mel_tensors.iter().enumerate() {
            tracing::debug!(segment = i, "Transcribing audio segment");
            let text = self.decode_segment(&mut model, mel_tensor, language_token);
            model.reset_kv_cache();
            let text = text?;
            if !text.is_empty() {
                segments.push(text);
            }
        }

        let transcript = segments.join(" ");

        tracing::info!(
            segments = segments.len(),
            chars = transcript.len(),
            "Audio transcription completed"
        );

        Ok(transcript)
    }

    fn language_token(&self, language: &str) -> Result<Option<u32>, TranscriptionError> {
        if !self.multilingual {
            if language != "en" {
                tracing::warn!(language, "English-only model ignores language hint");
            }
            return Ok(None);
        }
        let token = format!("<|{}|>", language.to_lowercase());
        self.tokenizer.token_to_id(&token).map(Some).ok_or_else(|| {
            TranscriptionError::TranscriptionFailed(format!("unsupported language: {}", language))
        })
    }

    fn decode_segment(
        &self,
        model: &mut m::model::Whisper,
        mel: &Tensor,
        language_token: Option<u32>,
    ) -> Result<String, TranscriptionError> {
        let sot_token = token_id(&self.tokenizer, m::SOT_TOKEN)?;
        let transcribe_token = token_id(&self.tokenizer, m::TRANSCRIBE_TOKEN)?;
        let no_timestamps_token = token_id(&self.tokenizer, m::NO_TIMESTAMPS_TOKEN)?;
        let eot_token = token_id(&self.tokenizer, m::EOT_TOKEN)?;

        let audio_features = model
            .encoder
            .forward(mel, true)
            .map_err(inference_error("encoder"))?;

        let mut tokens = vec![sot_token];
        tokens.extend(language_token);
        tokens.push(transcribe_token);
        tokens.push(no_timestamps_token);
        let prompt_len = tokens.len();

        for step in 0..MAX_DECODE_TOKENS {
            let token_tensor = Tensor::new(tokens.as_slice(), &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(inference_error("token tensor"))?;

            let decoder_output = model
                .decoder
                .forward(&token_tensor, &audio_features, step == 0)
                .map_err(inference_error("decoder"))?;

            let logits = decoder_output
                .squeeze(0)
                .and_then(|out| model.decoder.final_linear(&out))
                .map_err(inference_error("linear"))?;

            let seq_len = logits.dim(0).map_err(inference_error("logits"))?;
            let next_token = logits
                .get(seq_len - 1)
                .and_then(|last| last.argmax(0))
                .and_then(|t| t.to_scalar::<u32>())
                .map_err(inference_error("argmax"))?;

            if next_token == eot_token {
                break;
            }

            tokens.push(next_token);
        }

        let text = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("detokenize: {}", e)))?;

        Ok(text.trim().to_string())
    }
}

fn inference_error(stage: &'static str) -> impl Fn(candle_core::Error) -> TranscriptionError {
    move |e| TranscriptionError::TranscriptionFailed(format!("{}: {}", stage, e))
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32, TranscriptionError> {
    tokenizer.token_to_id(token).ok_or_else(|| {
        TranscriptionError::TranscriptionFailed(format!("token not found: {}", token))
    })
}

fn mel_filters_file(config: &Config) -> &'static str {
    match config.num_mel_bins {
        128 => "melfilters128.bytes",
        _ => "melfilters.bytes",
    }
}

/// Parses a little-endian f32 mel filterbank of `num_mel_bins` rows.
pub fn read_mel_filters(
    bytes: &[u8],
    num_mel_bins: usize,
) -> Result<Vec<f32>, TranscriptionError> {
    let expected_len = num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(TranscriptionError::ModelLoadFailed(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    let filters: Vec<f32> = bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(filters)
}
