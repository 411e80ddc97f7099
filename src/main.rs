//! narrate - Convert SSML documents to narrated MP3 audio using Google Cloud TTS

mod audio;
mod config;
mod pronounce;
mod ssml;
mod tts;
mod voices;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::NarrateConfig;
use indicatif::{ProgressBar, ProgressStyle};
use pronounce::{PhonemeFormat, PronunciationDictionary};
use ssml::chunker::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use ssml::Element;
use std::path::{Path, PathBuf};
use tts::google::GoogleTtsClient;
use tts::{synthesize_with_retry, Synthesizer, VoiceSelection};

/// Retry budget per fragment for rate limits and server errors.
const MAX_RETRIES: u32 = 3;

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Convert SSML documents to narrated MP3 audio using Google Cloud TTS", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the SSML file
    input: Option<PathBuf>,

    /// Output file path (default: <input-name>.mp3)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum characters per synthesis fragment
    #[arg(short, long)]
    chunk_size: Option<usize>,

    /// Pronunciation dictionary CSV (word,ipa,alias)
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Annotation format for the pronunciation dictionary
    #[arg(long, value_enum)]
    format: Option<PhonemeFormat>,

    /// Fallback voice name (e.g. "en-US-News-N")
    #[arg(long)]
    voice: Option<String>,

    /// Fallback language code (e.g. "en-GB")
    #[arg(long)]
    language: Option<String>,

    /// Treat the input as plain text instead of SSML
    #[arg(long, default_value_t = false)]
    text: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Annotate a document with a pronunciation dictionary, without synthesis
    Pronounce {
        /// Path to the SSML file
        input: PathBuf,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pronunciation dictionary CSV (word,ipa,alias)
        #[arg(long)]
        dict: Option<PathBuf>,

        /// Annotation format
        #[arg(long, value_enum)]
        format: Option<PhonemeFormat>,
    },
    /// Show how a document splits into synthesis fragments, without synthesis
    Chunks {
        /// Path to the SSML file
        input: PathBuf,

        /// Maximum characters per synthesis fragment
        #[arg(short, long)]
        chunk_size: Option<usize>,
    },
    /// Voice catalog tools
    Voices {
        #[command(subcommand)]
        action: VoicesAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the Google Cloud TTS API key
    SetKey {
        /// API key value
        key: String,
    },
    /// Set the fallback language code
    SetLanguage {
        /// BCP-47 code (e.g. "en-US")
        code: String,
    },
    /// Set the fragment size limit
    SetChunkSize {
        /// Maximum characters per fragment
        size: usize,
    },
    /// Set the fallback voice name
    SetVoice {
        /// Voice name (e.g. "en-US-News-N")
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum VoicesAction {
    /// List the known voice catalog
    List,
    /// Rewrite voice names in a document from a remap table
    Remap {
        /// Path to the SSML file
        input: PathBuf,

        /// Output file path (default: rewrite in place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML remap table with [[remap]] old/new pairs
        #[arg(long)]
        map: PathBuf,
    },
    /// Generate a sample MP3 for each catalog voice
    Samples {
        /// Directory to write samples into
        #[arg(long, default_value = "voice_samples")]
        out_dir: PathBuf,

        /// Only generate samples for recommended voices
        #[arg(long, default_value_t = false)]
        recommended: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Handle subcommands
    match &args.command {
        Some(Commands::Config { action }) => {
            return handle_config_command(action);
        }
        Some(Commands::Pronounce {
            input,
            output,
            dict,
            format,
        }) => {
            return handle_pronounce_command(input, output.as_deref(), dict.as_deref(), *format);
        }
        Some(Commands::Chunks { input, chunk_size }) => {
            return handle_chunks_command(input, *chunk_size);
        }
        Some(Commands::Voices { action }) => {
            return handle_voices_command(action).await;
        }
        None => {}
    }

    // Require an input file for synthesis
    let input_path = args
        .input
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Input file path is required. Run 'narrate --help' for usage."))?;

    if !input_path.exists() {
        anyhow::bail!("Input file not found: {}", input_path.display());
    }

    // Load configuration
    let config = NarrateConfig::load().context("Failed to load configuration")?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| input_path.with_extension("mp3"));

    let voice = build_voice_selection(&args, &config);

    if args.debug {
        eprintln!("Input: {}", input_path.display());
        eprintln!("Output: {}", output_path.display());
        eprintln!("Language: {}", voice.language_code);
        eprintln!("Voice: {:?}", voice.name);
    }

    let content = std::fs::read_to_string(&input_path)
        .with_context(|| format!("Failed to read {}", input_path.display()))?;

    let api_key = config
        .resolve_api_key()
        .ok_or(tts::TtsError::MissingApiKey)?;
    let client = GoogleTtsClient::new(api_key);

    // Plain-text mode bypasses SSML parsing and chunking entirely
    if args.text {
        eprintln!("Synthesizing plain text ({} chars)...", content.chars().count());
        let payload = client
            .synthesize_text(&content, &voice)
            .await
            .context("Synthesis failed")?;
        audio::stitch_mp3_segments(&[payload], &output_path)?;
        report_output(&output_path)?;
        return Ok(());
    }

    let mut nodes = ssml::parse_fragment(&content)
        .with_context(|| format!("Failed to parse {}", input_path.display()))?;

    // Pronunciation pre-pass
    let dict_path = args.dict.clone().or_else(|| config.dictionary.clone());
    if let Some(ref path) = dict_path {
        let dictionary = PronunciationDictionary::from_path(path)
            .with_context(|| format!("Failed to load dictionary {}", path.display()))?;
        let format = args.format.unwrap_or(config.format);
        eprintln!(
            "Applying {} pronunciation entries ({})...",
            dictionary.len(),
            format.as_str()
        );
        nodes = annotate_nodes(nodes, &dictionary, format);
    }

    let chunk_size = resolve_chunk_size(args.chunk_size, &config);

    let fragments = ssml::chunker::chunk_nodes(&nodes, chunk_size);
    if fragments.is_empty() {
        anyhow::bail!("No synthesizable content found in {}", input_path.display());
    }

    eprintln!(
        "Synthesizing {} fragments via {} (limit {} chars)...",
        fragments.len(),
        client.name(),
        chunk_size
    );

    if args.debug {
        for (i, fragment) in fragments.iter().enumerate() {
            eprintln!("  fragment {}: {} chars", i + 1, fragment.chars().count());
        }
    }

    let pb = ProgressBar::new(fragments.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut segments = Vec::with_capacity(fragments.len());
    for (i, fragment) in fragments.iter().enumerate() {
        let payload = synthesize_with_retry(&client, fragment, &voice, MAX_RETRIES)
            .await
            .with_context(|| format!("Synthesis failed for fragment {}/{}", i + 1, fragments.len()))?;
        segments.push(payload);
        pb.set_position((i + 1) as u64);
    }

    pb.finish_with_message("Synthesis complete");

    eprintln!("\nAssembling audio...");
    audio::stitch_mp3_segments(&segments, &output_path)?;

    report_output(&output_path)?;

    Ok(())
}

/// Fold CLI flags over the stored configuration.
fn build_voice_selection(args: &Args, config: &NarrateConfig) -> VoiceSelection {
    let language = args
        .language
        .clone()
        .unwrap_or_else(|| config.language_code.clone());
    let mut voice = VoiceSelection::for_language(language);
    if let Some(name) = args.voice.clone().or_else(|| config.voice_name.clone()) {
        voice = voice.with_name(name);
    }
    voice
}

/// Fragment limit from flag or config.
fn resolve_chunk_size(requested: Option<usize>, config: &NarrateConfig) -> usize {
    clamp_chunk_size(requested.unwrap_or(config.chunk_size))
}

/// A size beyond what the API accepts falls back to the default, with a
/// warning. Both the synthesis path and `config set-chunk-size` go through
/// here so a stored value never behaves differently from a flag.
fn clamp_chunk_size(size: usize) -> usize {
    if size > MAX_CHUNK_SIZE {
        log::warn!(
            "chunk size {} exceeds the {} char API limit, using {}",
            size,
            MAX_CHUNK_SIZE,
            DEFAULT_CHUNK_SIZE
        );
        DEFAULT_CHUNK_SIZE
    } else {
        size
    }
}

/// Annotate top-level nodes by wrapping them in a temporary root so tail
/// text is processed alongside element content.
fn annotate_nodes(
    nodes: Vec<Element>,
    dictionary: &PronunciationDictionary,
    format: PhonemeFormat,
) -> Vec<Element> {
    let mut root = Element::new("speak");
    root.children = nodes;
    pronounce::annotate_tree(&mut root, dictionary, format);
    root.children
}

/// Print output location, size, and duration when ffprobe is available.
fn report_output(output_path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(output_path)?;
    let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);

    if audio::is_ffprobe_available() {
        if let Ok(duration_ms) = audio::get_audio_duration_ms(output_path) {
            let total_secs = duration_ms / 1000;
            eprintln!(
                "Output: {} ({:.1} MB, {}m{:02}s)",
                output_path.display(),
                size_mb,
                total_secs / 60,
                total_secs % 60
            );
            return Ok(());
        }
    }

    eprintln!("Output: {} ({:.1} MB)", output_path.display(), size_mb);
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarrateConfig::load()?;
            println!("Configuration file: {:?}", NarrateConfig::config_path()?);
            println!();
            if config.api_key.is_some() {
                println!("api_key = (set)");
            } else {
                println!("api_key = (none, falls back to GOOGLE_TTS_API_KEY)");
            }
            println!("language_code = \"{}\"", config.language_code);
            if let Some(voice) = &config.voice_name {
                println!("voice_name = \"{}\"", voice);
            } else {
                println!("voice_name = (none)");
            }
            println!("chunk_size = {}", config.chunk_size);
            println!("format = \"{}\"", config.format.as_str());
            if let Some(dict) = &config.dictionary {
                println!("dictionary = \"{}\"", dict.display());
            } else {
                println!("dictionary = (none)");
            }
        }
        ConfigAction::SetKey { key } => {
            let mut config = NarrateConfig::load()?;
            config.api_key = Some(key.clone());
            config.save()?;
            println!("API key saved.");
        }
        ConfigAction::SetLanguage { code } => {
            let mut config = NarrateConfig::load()?;
            config.language_code = code.clone();
            config.save()?;
            println!("Default language set to: {}", code);
        }
        ConfigAction::SetChunkSize { size } => {
            let mut config = NarrateConfig::load()?;
            config.chunk_size = clamp_chunk_size(*size);
            config.save()?;
            println!("Default chunk size set to: {}", config.chunk_size);
        }
        ConfigAction::SetVoice { name } => {
            let mut config = NarrateConfig::load()?;
            config.voice_name = Some(name.clone());
            config.save()?;
            println!("Default voice set to: {}", name);
        }
    }
    Ok(())
}

fn handle_pronounce_command(
    input: &Path,
    output: Option<&Path>,
    dict: Option<&Path>,
    format: Option<PhonemeFormat>,
) -> Result<()> {
    let config = NarrateConfig::load().context("Failed to load configuration")?;

    let dict_path = dict
        .map(Path::to_path_buf)
        .or_else(|| config.dictionary.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No dictionary given. Pass --dict or set one with 'narrate config'.")
        })?;

    let dictionary = PronunciationDictionary::from_path(&dict_path)
        .with_context(|| format!("Failed to load dictionary {}", dict_path.display()))?;
    let format = format.unwrap_or(config.format);

    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let rewritten = if content.trim_start().starts_with("<speak") {
        pronounce::annotate_document(&content, &dictionary, format)
            .with_context(|| format!("Failed to parse {}", input.display()))?
    } else {
        let nodes = ssml::parse_fragment(&content)
            .with_context(|| format!("Failed to parse {}", input.display()))?;
        let annotated = annotate_nodes(nodes, &dictionary, format);
        annotated.iter().map(|node| node.to_ssml()).collect()
    };

    match output {
        Some(path) => {
            std::fs::write(path, rewritten)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Annotated document written to {}", path.display());
        }
        None => println!("{}", rewritten),
    }

    Ok(())
}

fn handle_chunks_command(input: &Path, chunk_size: Option<usize>) -> Result<()> {
    let config = NarrateConfig::load().context("Failed to load configuration")?;
    let chunk_size = resolve_chunk_size(chunk_size, &config);

    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let fragments = ssml::chunker::chunk_document(&content, chunk_size)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    println!("Fragments: {} (limit {} chars)", fragments.len(), chunk_size);
    for (i, fragment) in fragments.iter().enumerate() {
        let chars = fragment.chars().count();
        let marker = if chars > chunk_size { " (oversized)" } else { "" };
        println!("  {}: {} chars{}", i + 1, chars, marker);
    }

    if let Some(first) = fragments.first() {
        let preview: String = first.chars().take(200).collect();
        println!("\nFirst fragment preview:\n{}", preview);
    }

    Ok(())
}

async fn handle_voices_command(action: &VoicesAction) -> Result<()> {
    match action {
        VoicesAction::List => {
            for info in voices::VOICE_CATALOG {
                let star = if info.recommended { "*" } else { " " };
                println!("{} {:<24} {:<8} {}", star, info.name, info.gender, info.family);
            }
            println!("\n* recommended for narration");
        }
        VoicesAction::Remap { input, output, map } => {
            let remap = voices::VoiceRemap::load(map)?;
            let content = std::fs::read_to_string(input)
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let (rewritten, report) = voices::remap_voice_names(&content, &remap);
            for (old, new, count) in &report {
                println!("{} -> {}: {} occurrence(s)", old, new, count);
            }

            let target = output.as_deref().unwrap_or(input.as_path());
            std::fs::write(target, rewritten)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            eprintln!("Rewritten document written to {}", target.display());
        }
        VoicesAction::Samples {
            out_dir,
            recommended,
        } => {
            let config = NarrateConfig::load().context("Failed to load configuration")?;
            let api_key = config
                .resolve_api_key()
                .ok_or(tts::TtsError::MissingApiKey)?;
            let client = GoogleTtsClient::new(api_key);

            eprintln!("Generating voice samples into {}...", out_dir.display());
            let (generated, failed) =
                voices::generate_samples(&client, out_dir, *recommended).await?;
            eprintln!("\nGenerated: {}, Failed: {}", generated, failed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_within_limit_passes_through() {
        assert_eq!(clamp_chunk_size(3000), 3000);
        assert_eq!(clamp_chunk_size(MAX_CHUNK_SIZE), MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_oversized_chunk_size_falls_back_to_default() {
        assert_eq!(clamp_chunk_size(MAX_CHUNK_SIZE + 1), DEFAULT_CHUNK_SIZE);
        assert_eq!(clamp_chunk_size(100_000), DEFAULT_CHUNK_SIZE);
    }
}
