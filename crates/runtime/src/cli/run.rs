//! `talkagent run`: one-shot turn.
//!
//! Sends a single message to a persona with no prior history, prints the
//! reply, and optionally saves the spoken reply as a WAV file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use ta_domain::config::Config;
use ta_domain::persona::TurnRequest;
use ta_domain::stream::{Completion, TurnResult};

use super::{build_orchestrator, find_persona, FALLBACK_REPLY};
use crate::audio::{pcm_duration, write_wav};

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    persona: &'a str,
    text: &'a str,
    completion: Completion,
    audio_bytes: usize,
    audio_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_file: Option<&'a Path>,
}

/// Run one turn and print the reply.
///
/// On failure the generic fallback reply is printed to stdout and the
/// error to stderr, and `false` is returned so the caller can exit
/// non-zero.
pub async fn run(
    config: &Config,
    message: String,
    persona_id: &str,
    audio_out: Option<PathBuf>,
    json_output: bool,
) -> anyhow::Result<bool> {
    let persona = find_persona(config, persona_id)?.clone();
    let orchestrator = build_orchestrator(config)?;
    let request = TurnRequest::new(message, persona);

    let result = match orchestrator.run_turn(&request).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            println!("{FALLBACK_REPLY}");
            return Ok(false);
        }
    };

    let sample_rate = config.backend.output_sample_rate;
    let audio_file = match (&audio_out, &result.audio) {
        (Some(path), Some(pcm)) => {
            write_wav(path, pcm, sample_rate)?;
            Some(path.as_path())
        }
        (Some(_), None) => {
            eprintln!("(no audio in reply, nothing written)");
            None
        }
        _ => None,
    };

    if json_output {
        print_json(&request, &result, sample_rate, audio_file)?;
    } else {
        println!("{}", result.text);
        if result.completion == Completion::ClosedEarly {
            eprintln!("\x1b[2m(session closed before the reply completed)\x1b[0m");
        }
        if let Some(path) = audio_file {
            eprintln!("\x1b[2m[audio: {}]\x1b[0m", path.display());
        }
    }

    Ok(true)
}

fn print_json(
    request: &TurnRequest,
    result: &TurnResult,
    sample_rate: u32,
    audio_file: Option<&Path>,
) -> anyhow::Result<()> {
    let summary = RunSummary {
        persona: &request.persona.display_name,
        text: &result.text,
        completion: result.completion,
        audio_bytes: result.audio_len(),
        audio_ms: pcm_duration(result.audio_len(), sample_rate).as_millis() as u64,
        audio_file,
    };
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| anyhow::anyhow!("serializing summary: {e}"))?;
    println!("{json}");
    Ok(())
}
