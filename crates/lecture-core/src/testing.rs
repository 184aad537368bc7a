//! Scripted stand-in for a real browser

use crate::browser::BrowserHandle;
use crate::error::BrowserError;
use crate::events::UiEvent;
use crate::status::StatusBoard;
use async_trait::async_trait;
use lecture_models::DownloadStatus;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub key: String,
    pub text: String,
    children: HashMap<String, Vec<FakeElement>>,
}

impl FakeElement {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, selector: &str, child: FakeElement) -> Self {
        self.children.entry(selector.to_string()).or_default().push(child);
        self
    }
}

type ScriptHandler = Box<dyn Fn(&str, &[Value]) -> Result<Value, BrowserError> + Send + Sync>;

#[derive(Default)]
pub struct FakeBrowser {
    elements: Mutex<HashMap<String, Vec<FakeElement>>>,
    click_effects: Mutex<HashMap<String, Vec<(String, Vec<FakeElement>)>>>,
    failing_clicks: Mutex<HashSet<String>>,
    script_handler: Mutex<Option<ScriptHandler>>,
    pub clicks: Mutex<Vec<String>>,
    pub scripts: Mutex<Vec<(String, Vec<Value>)>>,
    pub navigations: Mutex<Vec<String>>,
    pub lookups: AtomicUsize,
    pub reloads: AtomicUsize,
    pub closed: AtomicBool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_elements(&self, selector: &str, elements: Vec<FakeElement>) {
        self.elements.lock().unwrap().insert(selector.to_string(), elements);
    }

    /// After `key` is clicked, `selector` resolves to `elements`
    pub fn on_click(&self, key: &str, selector: &str, elements: Vec<FakeElement>) {
        self.click_effects
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push((selector.to_string(), elements));
    }

    pub fn fail_clicks_on(&self, key: &str) {
        self.failing_clicks.lock().unwrap().insert(key.to_string());
    }

    pub fn on_script<F>(&self, handler: F)
    where
        F: Fn(&str, &[Value]) -> Result<Value, BrowserError> + Send + Sync + 'static,
    {
        *self.script_handler.lock().unwrap() = Some(Box::new(handler));
    }

    pub fn clicked(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<FakeElement>, BrowserError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.elements.lock().unwrap().get(selector).cloned().unwrap_or_default())
    }

    async fn find_within(&self, parent: &FakeElement, selector: &str) -> Result<Vec<FakeElement>, BrowserError> {
        Ok(parent.children.get(selector).cloned().unwrap_or_default())
    }

    async fn element_text(&self, element: &FakeElement) -> Result<String, BrowserError> {
        Ok(element.text.clone())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        self.scripts.lock().unwrap().push((script.to_string(), args.clone()));
        match self.script_handler.lock().unwrap().as_ref() {
            Some(handler) => handler(script, &args),
            None => Ok(Value::Null),
        }
    }

    async fn click(&self, element: &FakeElement) -> Result<(), BrowserError> {
        if self.failing_clicks.lock().unwrap().contains(&element.key) {
            return Err(BrowserError::Interaction(format!("{} is not clickable", element.key)));
        }
        self.clicks.lock().unwrap().push(element.key.clone());
        let effects = self.click_effects.lock().unwrap().get(&element.key).cloned();
        for (selector, elements) in effects.unwrap_or_default() {
            self.set_elements(&selector, elements);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Status board wired to a channel the test can drain
pub fn test_board() -> (StatusBoard, mpsc::UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusBoard::new(Arc::new(tx.clone()), Arc::new(tx)), rx)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> (Vec<String>, Vec<(String, DownloadStatus)>) {
    let mut messages = Vec::new();
    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            UiEvent::Status(message) => messages.push(message),
            UiEvent::Progress { request, status, .. } => progress.push((request.to_string(), status)),
        }
    }
    (messages, progress)
}
