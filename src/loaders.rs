use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::models::ModelWrapper;
use tokenizers::normalizers::{BertNormalizer, NormalizerWrapper};
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{Model, Tokenizer, TokenizerBuilder, TruncationParams};

use crate::error::{PipelineError, Result};

const MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

/// A single file inside a hub repository, fetched through the local hub cache.
#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub revision: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, revision: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            revision: revision.into(),
            filename: filename.into(),
        }
    }

    /// Another file of the same repository and revision.
    pub fn sibling(&self, filename: &str) -> Self {
        Self::new(&self.repo, &self.revision, filename)
    }

    pub fn load(&self) -> Result<PathBuf> {
        let hf_api = ApiBuilder::new().with_progress(false).build().map_err(|e| {
            PipelineError::Download(format!("Failed to initialize HuggingFace API: {e}"))
        })?;
        let hf_repo = hf_api.repo(Repo::with_revision(
            self.repo.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));

        let mut attempts = 0u32;

        for attempt in 0..MAX_DOWNLOAD_ATTEMPTS {
            attempts = attempt + 1;
            match hf_repo.get(self.filename.as_str()) {
                Ok(path) => return Ok(path),
                // Another process holds the cache lock for this blob.
                Err(e)
                    if e.to_string().contains("Lock acquisition failed")
                        && attempt < MAX_DOWNLOAD_ATTEMPTS - 1 =>
                {
                    let wait_time = Duration::from_millis(100 * (1 << attempt));
                    tracing::debug!(
                        file = %self.filename,
                        repo = %self.repo,
                        ?wait_time,
                        "hub cache locked, retrying"
                    );
                    std::thread::sleep(wait_time);
                }
                Err(e) => {
                    return Err(PipelineError::Download(format!(
                        "Failed to download '{}' from '{}@{}': {}",
                        self.filename, self.repo, self.revision, e
                    )));
                }
            }
        }

        Err(PipelineError::Download(format!(
            "Download timed out for '{}' from '{}' after {} attempt(s)",
            self.filename, self.repo, attempts
        )))
    }
}

/// Loads the repository tokenizer and caps encodings at the model's sequence length.
#[derive(Debug, Clone)]
pub struct TokenizerLoader {
    pub tokenizer_file_loader: HfLoader,
    pub max_length: usize,
}

impl TokenizerLoader {
    pub fn new(repo: &str, revision: &str, max_length: usize) -> Self {
        Self {
            tokenizer_file_loader: HfLoader::new(repo, revision, "tokenizer.json"),
            max_length,
        }
    }

    /// Prefers `tokenizer.json`; older BERT-family repos only ship `vocab.txt`, in which case a
    /// WordPiece tokenizer is assembled from it.
    pub fn load(&self) -> Result<Tokenizer> {
        let tokenizer = match self.tokenizer_file_loader.load() {
            Ok(path) => Tokenizer::from_file(&path).map_err(|e| {
                PipelineError::Tokenization(format!(
                    "Failed to load tokenizer from '{}': {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) => {
                tracing::debug!(
                    repo = %self.tokenizer_file_loader.repo,
                    error = %e,
                    "no tokenizer.json, building WordPiece tokenizer from vocab.txt"
                );
                let vocab_path = self.tokenizer_file_loader.sibling("vocab.txt").load()?;
                wordpiece_tokenizer(&vocab_path, self.do_lower_case())?
            }
        };

        truncate_at(tokenizer, self.max_length)
    }

    /// `do_lower_case` from `tokenizer_config.json`; uncased checkpoints are the common case.
    fn do_lower_case(&self) -> bool {
        #[derive(Deserialize)]
        struct TokenizerConfig {
            do_lower_case: Option<bool>,
        }

        self.tokenizer_file_loader
            .sibling("tokenizer_config.json")
            .load()
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|text| serde_json::from_str::<TokenizerConfig>(&text).ok())
            .and_then(|cfg| cfg.do_lower_case)
            .unwrap_or(true)
    }
}

/// BERT WordPiece pipeline: BERT normalizer, whitespace/punctuation split, `[CLS] .. [SEP]`.
pub fn wordpiece_tokenizer(vocab_path: &Path, lowercase: bool) -> Result<Tokenizer> {
    let vocab = vocab_path.to_str().ok_or_else(|| {
        PipelineError::Tokenization(format!(
            "Vocabulary path '{}' is not valid UTF-8",
            vocab_path.display()
        ))
    })?;

    let wordpiece = WordPiece::from_file(vocab).build().map_err(|e| {
        PipelineError::Tokenization(format!("Failed to read vocabulary '{vocab}': {e}"))
    })?;

    let special_id = |token: &str| {
        wordpiece.token_to_id(token).ok_or_else(|| {
            PipelineError::Tokenization(format!("Vocabulary '{vocab}' has no {token} token"))
        })
    };
    let cls = special_id("[CLS]")?;
    let sep = special_id("[SEP]")?;

    let tokenizer = TokenizerBuilder::new()
        .with_model(ModelWrapper::from(wordpiece))
        .with_normalizer(Some(NormalizerWrapper::from(BertNormalizer::new(
            true, true, None, lowercase,
        ))))
        .with_pre_tokenizer(Some(PreTokenizerWrapper::from(BertPreTokenizer)))
        .with_post_processor(Some(PostProcessorWrapper::from(BertProcessing::new(
            ("[SEP]".into(), sep),
            ("[CLS]".into(), cls),
        ))))
        .with_decoder(Some(DecoderWrapper::from(WordPieceDecoder::default())))
        .build()
        .map_err(|e| PipelineError::Tokenization(format!("Failed to assemble tokenizer: {e}")))?;

    Ok(Tokenizer::from(tokenizer))
}

/// Inputs longer than the position table are cut instead of failing the forward pass.
fn truncate_at(mut tokenizer: Tokenizer, max_length: usize) -> Result<Tokenizer> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| {
            PipelineError::Tokenization(format!("Failed to configure truncation: {e}"))
        })?;
    // Single sequences are never padded.
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

/// Fields of a sequence-classification `config.json` the pipeline relies on.
///
/// The backbone reads its own copy of the file; this only covers the head and the label map.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Hidden size of the encoder output.
    pub dim: usize,
    /// Longest sequence the position embeddings cover.
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub id2label: HashMap<String, String>,
}

fn default_max_position_embeddings() -> usize {
    512
}

impl ClassifierConfig {
    /// Labels ordered by class index.
    pub fn labels(&self) -> Result<Vec<String>> {
        if self.id2label.is_empty() {
            return Err(PipelineError::Config(
                "config.json has no id2label mapping; not a classification checkpoint".into(),
            ));
        }

        (0..self.id2label.len())
            .map(|i| {
                self.id2label.get(&i.to_string()).cloned().ok_or_else(|| {
                    let mut available: Vec<&String> = self.id2label.keys().collect();
                    available.sort();
                    PipelineError::Config(format!(
                        "id2label is not contiguous: missing class {i}. Available: {}",
                        available
                            .into_iter()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })
            })
            .collect()
    }
}

/// Raw `config.json` text plus the parsed classifier fields.
pub struct ConfigLoader {
    pub config_file_loader: HfLoader,
}

impl ConfigLoader {
    pub fn new(repo: &str, revision: &str) -> Self {
        Self {
            config_file_loader: HfLoader::new(repo, revision, "config.json"),
        }
    }

    pub fn load(&self) -> Result<(String, ClassifierConfig)> {
        let config_path = self.config_file_loader.load()?;
        let config_str = std::fs::read_to_string(&config_path)?;
        let classifier: ClassifierConfig = serde_json::from_str(&config_str)?;
        Ok((config_str, classifier))
    }
}

/// Memory-maps `model.safetensors`, falling back to `pytorch_model.bin`.
pub struct WeightsLoader {
    pub repo: String,
    pub revision: String,
}

impl WeightsLoader {
    pub fn new(repo: &str, revision: &str) -> Self {
        Self {
            repo: repo.into(),
            revision: revision.into(),
        }
    }

    pub fn load(&self, device: &Device) -> Result<VarBuilder<'static>> {
        let weights_path = HfLoader::new(&self.repo, &self.revision, "model.safetensors")
            .load()
            .or_else(|_| HfLoader::new(&self.repo, &self.revision, "pytorch_model.bin").load())?;

        let loaded = if weights_path.extension().is_some_and(|e| e == "safetensors") {
            // SAFETY: the hub cache files are not modified while the mapping is alive.
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, device) }
        } else {
            VarBuilder::from_pth(&weights_path, DType::F32, device)
        };

        let vb = loaded.map_err(|e| {
            PipelineError::Config(format!(
                "Failed to load weights from '{}': {}",
                weights_path.display(),
                e
            ))
        })?;

        Ok(vb)
    }
}
