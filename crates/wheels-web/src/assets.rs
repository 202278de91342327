use crate::audio::WebAudioBackend;
use anyhow::{anyhow, bail, Result};
use js_sys::{Array, Reflect};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys as web;
use wheels_core::{normalize_sample_path, AudioEngine, SampleGroup};

pub type SharedEngine = Rc<RefCell<AudioEngine<WebAudioBackend>>>;

fn js_err(e: JsValue) -> anyhow::Error {
    anyhow!("{:?}", e)
}

async fn fetch(url: &str) -> Result<web::Response> {
    let window = web::window().ok_or_else(|| anyhow!("no window"))?;
    let resp = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(js_err)?;
    resp.dyn_into::<web::Response>().map_err(js_err)
}

/// `<dir>/manifest.json` as `{"files": [...]}`, entries resolved against `dir`.
/// A missing or malformed manifest is an empty list.
pub async fn fetch_manifest(dir: &str) -> Vec<String> {
    match try_fetch_manifest(dir).await {
        Ok(files) => files,
        Err(e) => {
            log::debug!("[assets] no manifest for {}: {:#}", dir, e);
            Vec::new()
        }
    }
}

async fn try_fetch_manifest(dir: &str) -> Result<Vec<String>> {
    let resp = fetch(&format!("{}/manifest.json", dir.trim_end_matches('/'))).await?;
    if !resp.ok() {
        bail!("HTTP {}", resp.status());
    }
    let json = JsFuture::from(resp.json().map_err(js_err)?)
        .await
        .map_err(js_err)?;
    let files = Reflect::get(&json, &JsValue::from_str("files")).map_err(js_err)?;
    if !Array::is_array(&files) {
        bail!("`files` is not an array");
    }
    Ok(Array::from(&files)
        .iter()
        .filter_map(|entry| entry.as_string())
        .filter_map(|entry| normalize_sample_path(dir, &entry))
        .collect())
}

async fn load_buffer(ctx: &web::AudioContext, path: &str) -> Result<web::AudioBuffer> {
    let resp = fetch(path).await?;
    if !resp.ok() {
        bail!("HTTP {}", resp.status());
    }
    let bytes = JsFuture::from(resp.array_buffer().map_err(js_err)?)
        .await
        .map_err(js_err)?;
    let bytes: js_sys::ArrayBuffer = bytes.dyn_into().map_err(js_err)?;
    let decoded = JsFuture::from(ctx.decode_audio_data(&bytes).map_err(js_err)?)
        .await
        .map_err(js_err)?;
    decoded.dyn_into::<web::AudioBuffer>().map_err(js_err)
}

/// Fill every group's pool from its manifest, then decode each distinct path
/// once. Decodes run concurrently; a failure only loses that one sample.
pub async fn preload_all(engine: SharedEngine) {
    if !engine.borrow().is_available() {
        return;
    }
    for group in SampleGroup::ALL {
        let files = fetch_manifest(group.default_dir()).await;
        log::info!(
            "[assets] {} {} samples listed",
            files.len(),
            group.name()
        );
        engine.borrow_mut().library_mut().register_pool(group, files);
    }

    let Some(ctx) = engine.borrow().backend().context().cloned() else {
        return;
    };
    let paths = engine.borrow().library().unique_paths();
    for path in paths {
        if engine.borrow().library().has_buffer(&path) {
            continue;
        }
        let engine = engine.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            match load_buffer(&ctx, &path).await {
                Ok(buffer) => engine.borrow_mut().library_mut().insert_buffer(path, buffer),
                Err(e) => engine
                    .borrow_mut()
                    .library_mut()
                    .mark_failed(path, &format!("{:#}", e)),
            }
        });
    }
}
