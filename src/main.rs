use anyhow::Result;
use tracing::{error, info};

use open_player::api;
use open_player::config::Config;
use open_player::sources::YtDlpClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_player=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Player v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    let state = api::AppState::new(config.clone());
    let app = api::router(state);

    // Manejar shutdown graceful
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⚠️ Señal de shutdown recibida, cerrando...");
            std::process::exit(0);
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Servidor escuchando en http://{} (caché activada)", addr);

    if let Err(why) = axum::serve(listener, app).await {
        error!("Error al ejecutar servidor: {:?}", why);
    }

    Ok(())
}

/// Verifica las dependencias críticas y sale
async fn health_check(config: &Config) -> Result<()> {
    let ytdlp = YtDlpClient::new(&config.ytdlp_path);
    match ytdlp.verify().await {
        Ok(version) => {
            println!("OK yt-dlp {version}");
            Ok(())
        }
        Err(e) => anyhow::bail!("Dependencias faltantes: {e}"),
    }
}
