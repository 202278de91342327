use crate::assets::SharedEngine;
use anyhow::{anyhow, Result};
use glam::Vec2;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys as web;
use wheels_core::constants::THRESHOLD_RADIUS_STEP;
use wheels_core::{ClickOutcome, SharedField};

const UNLOCK_EVENTS: [&str; 3] = ["pointerdown", "touchstart", "keydown"];

#[inline]
fn offset_position(ev: &web::MouseEvent) -> Vec2 {
    Vec2::new(ev.offset_x() as f32, ev.offset_y() as f32)
}

#[inline]
pub fn radius_delta_for_key(key: &str) -> Option<f32> {
    match key {
        "[" => Some(-THRESHOLD_RADIUS_STEP),
        "]" => Some(THRESHOLD_RADIUS_STEP),
        _ => None,
    }
}

pub fn handle_global_keydown(ev: &web::KeyboardEvent, field: &SharedField) {
    if ev.code() == "Space" {
        ev.prevent_default();
        field.toggle_mouse_output();
        return;
    }
    if let Some(delta) = radius_delta_for_key(&ev.key()) {
        field.adjust_radius(delta);
    }
}

fn log_click(outcome: ClickOutcome) {
    match outcome {
        ClickOutcome::Added(id) => log::info!("[field] added listener threshold #{}", id),
        ClickOutcome::Removed(t) => log::info!(
            "[field] removed listener threshold #{} at ({:.0}, {:.0})",
            t.id,
            t.position.x,
            t.position.y
        ),
        ClickOutcome::Missed => log::debug!("[field] no listener threshold under the pointer"),
        ClickOutcome::Ignored => {}
    }
}

fn listen<E>(
    target: &web::EventTarget,
    event: &str,
    handler: impl FnMut(E) + 'static,
) -> Result<()>
where
    E: wasm_bindgen::convert::FromWasmAbi + 'static,
{
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(E)>);
    target
        .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        .map_err(|e| anyhow!(format!("{:?}", e)))?;
    closure.forget();
    Ok(())
}

/// Pointer tracking and threshold placement on the drawing surface.
pub fn install_canvas_handlers(canvas: &web::HtmlCanvasElement, field: &SharedField) -> Result<()> {
    let target: &web::EventTarget = canvas.as_ref();

    let f = field.clone();
    listen(target, "pointermove", move |ev: web::PointerEvent| {
        f.borrow_mut().pointer_moved(offset_position(&ev));
    })?;

    let f = field.clone();
    listen(target, "pointerleave", move |_ev: web::PointerEvent| {
        f.borrow_mut().pointer_left();
    })?;

    // Left click adds, shift+left click removes.
    let f = field.clone();
    listen(target, "click", move |ev: web::MouseEvent| {
        if ev.button() != 0 {
            return;
        }
        let outcome = f
            .borrow_mut()
            .handle_primary_click(offset_position(&ev), ev.shift_key());
        log_click(outcome);
    })?;

    let f = field.clone();
    listen(target, "contextmenu", move |ev: web::MouseEvent| {
        ev.prevent_default();
        let outcome = f.borrow_mut().handle_secondary_click(offset_position(&ev));
        log_click(outcome);
    })?;
    Ok(())
}

pub fn install_key_handlers(field: &SharedField) -> Result<()> {
    let window = web::window().ok_or_else(|| anyhow!("no window"))?;
    let f = field.clone();
    listen(window.as_ref(), "keydown", move |ev: web::KeyboardEvent| {
        handle_global_keydown(&ev, &f);
    })
}

/// Browsers keep a fresh context suspended until a user gesture; resume it on
/// the first one. Each listener fires at most once.
pub fn install_unlock_handlers(engine: &SharedEngine) -> Result<()> {
    if !engine.borrow().backend().is_suspended() {
        return Ok(());
    }
    let window = web::window().ok_or_else(|| anyhow!("no window"))?;
    let options = web::AddEventListenerOptions::new();
    options.set_once(true);
    for event in UNLOCK_EVENTS {
        let engine = engine.clone();
        let closure = Closure::wrap(Box::new(move |_ev: web::Event| {
            resume(&engine);
        }) as Box<dyn FnMut(_)>);
        window
            .add_event_listener_with_callback_and_add_event_listener_options(
                event,
                closure.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|e| anyhow!(format!("{:?}", e)))?;
        closure.forget();
    }
    Ok(())
}

pub fn resume(engine: &SharedEngine) {
    let Some(promise) = engine.borrow().backend().resume() else {
        return;
    };
    spawn_local(async move {
        if let Err(e) = JsFuture::from(promise).await {
            log::error!("[audio] failed to resume audio context: {:?}", e);
        }
    });
}
