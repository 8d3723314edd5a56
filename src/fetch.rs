//! fetch.rs
//! Acceso HTTP a los endpoints remotos: GET con deadline propio y PUT
//! best-effort para el write-back de estados.

use anyhow::Result;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::timeout;

/// GET con deadline propio: carrera contra un timer, no contra el timeout
/// del transporte, para que una conexión colgada no detenga al llamador.
/// Si el deadline vence primero la petición en vuelo no se aborta; su
/// resultado simplemente se descarta.
pub async fn get_con_deadline(client: &Client, url: &str, deadline_ms: u64) -> Result<Bytes> {
    let peticion = async {
        let resp = client
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(resp.bytes().await?),
            s => anyhow::bail!("HTTP {} en {}", s, url),
        }
    };
    match timeout(Duration::from_millis(deadline_ms), peticion).await {
        Ok(r) => r,
        Err(_) => anyhow::bail!("Timeout ({} ms) en {}", deadline_ms, url),
    }
}

/// PUT JSON con deadline; mismo contrato de carrera que el GET.
pub async fn put_json_con_deadline(
    client: &Client,
    url: &str,
    body: &serde_json::Value,
    deadline_ms: u64,
) -> Result<StatusCode> {
    let peticion = async {
        let resp = client.put(url).json(body).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(s),
            s => anyhow::bail!("HTTP {} en {}", s, url),
        }
    };
    match timeout(Duration::from_millis(deadline_ms), peticion).await {
        Ok(r) => r,
        Err(_) => anyhow::bail!("Timeout ({} ms) en {}", deadline_ms, url),
    }
}
