use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for medichat
#[derive(Parser)]
#[command(name = "medichat")]
#[command(about = "Medichat - AI medical assistant chat with conversation history")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Patient identifier the session and its history are tagged with
    #[arg(long, env = "MEDICHAT_PATIENT_ID", default_value = "demo-patient")]
    pub patient_id: String,

    /// Language code for greeting and replies ("en" for English, anything else
    /// falls back to French)
    #[arg(long, env = "MEDICHAT_LANGUAGE", default_value = "fr")]
    pub language: String,

    /// Directory holding conversation history and session logs
    #[arg(long, env = "MEDICHAT_DATA_DIR", default_value = ".medichat")]
    pub data_dir: PathBuf,

    /// Delay before the assistant reply lands, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    pub reply_delay_ms: u64,

    /// Fix the reply picker seed for a reproducible session
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Audio file standing in for the microphone during /record
    #[arg(long, value_name = "PATH", env = "MEDICHAT_AUDIO_SOURCE")]
    pub audio_source: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the blood-stock inventory as CSV
    Stock {
        /// Keep only this blood group (e.g. "A+")
        #[arg(long)]
        blood_type: Option<String>,

        /// Keep only this location
        #[arg(long)]
        location: Option<String>,

        /// Write the export here instead of the dated default name
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}
