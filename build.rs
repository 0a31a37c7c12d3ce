use std::path::{Path, PathBuf};

/// Build-time secrets exported to the crate via `env!`.
/// Unset values become empty strings so host builds never fail.
const SECRET_VARS: &[&str] = &[
    "BRIDGE_WIFI_SSID",
    "BRIDGE_WIFI_PASSWORD",
    "BRIDGE_SERVER_URL",
    "BRIDGE_BACKEND",
    "BRIDGE_MQTT_ENDPOINT",
    "BRIDGE_MQTT_THING_NAME",
];

/// PEM file paths; each file is copied NUL-terminated into OUT_DIR so the
/// MQTT TLS configuration can hand it to mbedtls as a C string.
const PEM_VARS: &[(&str, &str)] = &[
    ("BRIDGE_MQTT_CA_PEM", "mqtt_ca.pem"),
    ("BRIDGE_MQTT_CERT_PEM", "mqtt_cert.pem"),
    ("BRIDGE_MQTT_KEY_PEM", "mqtt_key.pem"),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // A missing .env is fine: CI and host tests run without secrets.
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for var in SECRET_VARS {
        println!("cargo:rerun-if-env-changed={var}");
        let value = std::env::var(var).unwrap_or_default();
        println!("cargo:rustc-env={var}={value}");
    }

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    for (var, file_name) in PEM_VARS {
        println!("cargo:rerun-if-env-changed={var}");
        let mut pem = match std::env::var(var) {
            Ok(src) if !src.is_empty() => {
                println!("cargo:rerun-if-changed={src}");
                std::fs::read(Path::new(&src)).unwrap_or_else(|e| {
                    println!("cargo:warning={var}: cannot read {src}: {e}");
                    Vec::new()
                })
            }
            _ => Vec::new(),
        };
        pem.push(0);
        std::fs::write(out_dir.join(file_name), pem).expect("OUT_DIR is writable");
    }

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
