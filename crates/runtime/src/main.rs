use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;

use ta_domain::config::{LogFormat, ObservabilityConfig};
use ta_runtime::cli::{self, Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { message, persona, audio_out, json } => {
            let (config, _) = cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            let outcome = cli::run::run(&config, message, &persona, audio_out, json).await;
            shutdown_tracing(tracer_provider);
            if !outcome? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Chat { persona } => {
            let (config, _) = cli::load_config()?;
            let tracer_provider = init_tracing(&config.observability);
            let outcome = cli::chat::chat(&config, &persona).await;
            shutdown_tracing(tracer_provider);
            outcome
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Personas => {
            let (config, _) = cli::load_config()?;
            cli::config::personas(&config);
            Ok(())
        }
        Command::Version => {
            println!("talkagent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize stderr tracing for turn-running commands.
///
/// `RUST_LOG` wins over the configured levels.  When `[observability.otlp]`
/// is set, turn spans are also exported via OTLP/gRPC.  The returned
/// [`SdkTracerProvider`](opentelemetry_sdk::trace::SdkTracerProvider)
/// must be shut down on exit to flush pending spans.
fn init_tracing(
    obs: &ObservabilityConfig,
) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(obs.filter_directives()));

    let fmt_layer = match obs.log_format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .boxed(),
    };

    let Some(otlp) = &obs.otlp else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
        return None;
    };

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp.endpoint)
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!(
                "WARNING: failed to create OTLP exporter for {}: {e}; \
                 continuing without OpenTelemetry",
                otlp.endpoint
            );
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
            return None;
        }
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(otlp.service_name.clone())
        .build();

    let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(
            otlp.sample_rate,
        ))
        .with_resource(resource)
        .build();

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer("talkagent"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    Some(tracer_provider)
}

fn shutdown_tracing(provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>) {
    if let Some(provider) = provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("WARNING: OpenTelemetry shutdown failed: {e}");
        }
    }
}
