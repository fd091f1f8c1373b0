//! qtransformers CLI
//!
//! Inspects classifier configurations and runs smoke forward passes on
//! synthetic input, in pure Rust on the CPU.
//!
//! Supports:
//! - Parameter summaries for text and vision configs
//! - One forward pass in evaluation or training mode
//! - Printing the built-in dataset presets as JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::prelude::*;
use burn_ndarray::NdArray;
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use burn_qtransformers::{
    ForwardMode, ImageClassifier, ImageClassifierConfig, ModelConfig, QuantumCircuits,
    RandomStream, SequenceClassifier, SequenceClassifierConfig,
};
use burn_qtransformers_core::init::ParamInit;

type CliBackend = NdArray<f32>;

#[derive(Parser)]
#[command(name = "qtransformers")]
#[command(about = "Inspect and smoke-test quantum-swappable transformer classifiers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print parameter counts per component
    Summary {
        /// Path to a JSON model config
        #[arg(short, long)]
        config: PathBuf,

        /// Parameter initialization seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Run one forward pass on synthetic input and print the logits
    Forward {
        /// Path to a JSON model config
        #[arg(short, long)]
        config: PathBuf,

        /// Batch size
        #[arg(short, long, default_value = "2")]
        batch: usize,

        /// Sequence length for text models (default: max_sequence_length)
        #[arg(long)]
        seq_len: Option<usize>,

        /// Seed for parameters and synthetic input
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Run in training mode (dropout active)
        #[arg(long)]
        train: bool,

        /// Dropout stream seed for training mode
        #[arg(long, default_value = "0")]
        dropout_seed: u64,
    },

    /// Print a preset configuration as JSON
    Preset {
        #[arg(value_enum)]
        name: Preset,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Mnist,
    ElectronPhoton,
    QuarkGluon,
    Imdb,
}

impl Preset {
    fn config(self) -> ModelConfig {
        match self {
            Preset::Mnist => ModelConfig::Vision(ImageClassifierConfig::mnist()),
            Preset::ElectronPhoton => ModelConfig::Vision(ImageClassifierConfig::electron_photon()),
            Preset::QuarkGluon => ModelConfig::Vision(ImageClassifierConfig::quark_gluon()),
            Preset::Imdb => ModelConfig::Text(SequenceClassifierConfig::imdb(20_000, 512)),
        }
    }
}

enum Classifier<B: Backend> {
    Text(SequenceClassifier<B>),
    Vision(ImageClassifier<B>),
}

fn build(
    config: &ModelConfig,
    seed: u64,
    device: &<CliBackend as Backend>::Device,
) -> Result<Classifier<CliBackend>> {
    let circuits = QuantumCircuits::classical();
    let model = match config {
        ModelConfig::Text(c) => Classifier::Text(c.init(&circuits, seed, device)?),
        ModelConfig::Vision(c) => Classifier::Vision(c.init(&circuits, seed, device)?),
    };
    Ok(model)
}

fn print_row(name: &str, count: usize) {
    println!("  {:<24} {:>10}", name, count);
}

fn summary(config_path: PathBuf, seed: u64) -> Result<()> {
    let config = ModelConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    let device = Default::default();
    let model = build(&config, seed, &device)?;

    let t = config.transformer();
    println!(
        "hidden_size={} heads={} blocks={} mlp_hidden_size={} dropout={}",
        t.hidden_size, t.num_heads, t.num_transformer_blocks, t.mlp_hidden_size, t.dropout_rate
    );

    let total = match &model {
        Classifier::Text(m) => {
            println!("Sequence classifier:");
            print_row("token_embedding", m.token_embedding.num_params());
            print_row("position_embedding", m.position_embedding.num_params());
            print_row("blocks", m.blocks.iter().map(|b| b.num_params()).sum());
            print_row("norm", m.norm.num_params());
            print_row("head", m.head.num_params());
            m.num_params()
        }
        Classifier::Vision(m) => {
            println!(
                "Image classifier ({:?} pooling, {} patches):",
                m.pooling(),
                m.num_patches()
            );
            print_row("patch_embed", m.patch_embed.num_params());
            print_row("cls_token", m.cls_token.as_ref().map_or(0, |c| c.num_params()));
            print_row("pos_embedding", m.pos_embedding.num_params());
            print_row("blocks", m.blocks.iter().map(|b| b.num_params()).sum());
            print_row("norm", m.norm.num_params());
            print_row("head", m.head.num_params());
            m.num_params()
        }
    };
    print_row("total", total);

    tracing::info!(total, "summary complete");
    Ok(())
}

fn forward(
    config_path: PathBuf,
    batch: usize,
    seq_len: Option<usize>,
    seed: u64,
    train: bool,
    dropout_seed: u64,
) -> Result<()> {
    let config = ModelConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    let device = Default::default();
    let model = build(&config, seed, &device)?;

    let mut stream = RandomStream::new(dropout_seed);
    let mut mode = if train {
        ForwardMode::training(&mut stream)
    } else {
        ForwardMode::Deterministic
    };
    tracing::info!(batch, train, "running forward pass");

    let logits = match (&config, &model) {
        (ModelConfig::Text(c), Classifier::Text(m)) => {
            let seq_len = seq_len.unwrap_or(c.max_sequence_length);
            let mut rng = StdRng::seed_from_u64(seed);
            let ids: Vec<i64> = (0..batch * seq_len)
                .map(|_| rng.gen_range(0..c.num_tokens as i64))
                .collect();
            let tokens = Tensor::<CliBackend, 2, Int>::from_data(
                TensorData::new(ids, [batch, seq_len]),
                &device,
            );
            m.forward(tokens, &mut mode)?
        }
        (ModelConfig::Vision(c), Classifier::Vision(m)) => {
            let shape = if c.channels_last {
                [batch, c.image_size, c.image_size, c.num_channels]
            } else {
                [batch, c.num_channels, c.image_size, c.image_size]
            };
            let images = ParamInit::new(seed).normal(shape, 1.0, &device);
            m.forward(images, &mut mode)?
        }
        _ => unreachable!("model is built from the same config"),
    };

    let [rows, classes] = logits.dims();
    let values: Vec<f32> = logits
        .into_data()
        .to_vec()
        .map_err(|e| anyhow::anyhow!("Failed to read logits: {:?}", e))?;

    println!("logits [{rows}, {classes}]:");
    for row in values.chunks(classes.max(1)) {
        let formatted: Vec<String> = row.iter().map(|v| format!("{v:>9.4}")).collect();
        println!("  {}", formatted.join(" "));
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { config, seed } => summary(config, seed),
        Commands::Forward {
            config,
            batch,
            seq_len,
            seed,
            train,
            dropout_seed,
        } => forward(config, batch, seq_len, seed, train, dropout_seed),
        Commands::Preset { name } => {
            println!("{}", name.config().to_json()?);
            Ok(())
        }
    }
}
