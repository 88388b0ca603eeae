use embassy_executor::Spawner;
use meteo_rs::logging::print_splash_screen;

#[cfg(target_os = "espidf")]
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    print_splash_screen();

    meteo_rs::esp::run().await
}

#[cfg(not(target_os = "espidf"))]
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    print_splash_screen();

    if let Err(e) = meteo_rs::simulator::run().await {
        meteo_rs::logging::log_panic(format_args!("{:#}", e));
        std::process::exit(1);
    }
}
