//! Bakes Wi-Fi credentials and the HTTP target into the firmware image.
//!
//! Values come from `.env` next to this file when present, falling back to
//! the build environment.

const REQUIRED: [&str; 2] = ["WIFI_SSID", "WIFI_PASSWORD"];
const OPTIONAL: [(&str, &str); 2] = [("HTTP_HOST", "example.com"), ("HTTP_PATH", "/")];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in REQUIRED.iter().chain(OPTIONAL.iter().map(|(key, _)| key)) {
        println!("cargo:rerun-if-env-changed={key}");
    }

    if let Err(e) = dotenvy::dotenv() {
        println!("cargo:warning=no .env loaded ({e}), using the build environment");
    }

    for key in REQUIRED {
        match std::env::var(key) {
            Ok(value) => println!("cargo:rustc-env={key}={value}"),
            Err(_) => panic!("{key} must be set in .env or the environment (see .env.example)"),
        }
    }

    for (key, default) in OPTIONAL {
        let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
