use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "persona-bot")]
#[command(about = "LINE chat bot personas with vector memory", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the webhook server for all configured personas")]
    Serve {
        /// Path to the config file
        #[arg(short, long, env = "PERSONA_BOT_CONFIG", default_value = "config.toml")]
        config: String,
    },

    #[command(about = "Run one chat exchange from the terminal (development)")]
    Chat {
        /// Persona name as configured in [[persona]]
        persona: String,

        /// User message
        message: String,

        /// Display name used for prompt personalization
        #[arg(long, default_value = "You")]
        user_name: String,

        /// Stable identifier used as the memory partition key
        #[arg(long, default_value = "local")]
        user_id: String,

        /// Path to the config file
        #[arg(short, long, env = "PERSONA_BOT_CONFIG", default_value = "config.toml")]
        config: String,
    },
}
