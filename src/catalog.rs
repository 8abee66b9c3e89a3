//! Remote definitions catalog: fetching, parsing and per-package lookup.
//!
//! The catalog is an XML document whose elements are named after package
//! identifiers and carry the current download URL as their text.

use crate::errors::*;
use bytes::Bytes;
use error_chain::bail;
use quick_xml::{events::Event, Reader};
use reqwest::Client;
use std::{collections::HashMap, fmt, time::Duration};
use tracing::{debug, info};

/// Builds the client used for the catalog request.
pub fn client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Downloads the catalog document as text.
pub async fn fetch(client: &Client, url: &str) -> Result<String> {
    info!(url, "fetching catalog");

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .chain_err(|| ErrorKind::CatalogFetch(url.to_string()))?;
    let body: Bytes = response
        .bytes()
        .await
        .chain_err(|| ErrorKind::CatalogFetch(url.to_string()))?;

    debug!(bytes = body.len(), "catalog received");
    String::from_utf8(body.to_vec())
        .chain_err(|| ErrorKind::CatalogParse("body is not valid UTF-8".to_string()))
}

/// Outcome of looking a package identifier up in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(String),
    NotFound,
    /// More than one text node matched; none is picked.
    Ambiguous(usize),
}

impl Resolution {
    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Found(url) => Some(url),
            _ => None,
        }
    }

    pub fn into_url(self) -> Option<String> {
        match self {
            Resolution::Found(url) => Some(url),
            _ => None,
        }
    }

    /// The line reported to the user for a miss.
    pub fn miss_report(&self, name: &str) -> Option<String> {
        match self {
            Resolution::Found(_) => None,
            Resolution::NotFound => Some(format!("[!] Package '{}' is not found", name)),
            Resolution::Ambiguous(count) => Some(format!(
                "[!] Package '{}' is ambiguous ({} matches in catalog)",
                name, count
            )),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Found(url) => write!(f, "{}", url),
            Resolution::NotFound => write!(f, "not found"),
            Resolution::Ambiguous(count) => write!(f, "ambiguous ({} matches)", count),
        }
    }
}

/// Read-only view of a parsed catalog.
///
/// Keeps, for every element name, the direct text nodes of all elements with
/// that name in document order.
#[derive(Debug, Default)]
pub struct Catalog {
    texts: HashMap<String, Vec<String>>,
}

struct OpenElement {
    name: String,
    texts: Vec<String>,
    in_text: bool,
}

impl OpenElement {
    fn push_text(&mut self, text: &str) {
        match self.texts.last_mut() {
            Some(last) if self.in_text => last.push_str(text),
            _ => self.texts.push(text.to_string()),
        }
        self.in_text = true;
    }
}

impl Catalog {
    pub fn parse(document: &str) -> Result<Catalog> {
        let mut reader = Reader::from_str(document);
        let mut texts: HashMap<String, Vec<String>> = HashMap::new();
        let mut open: Vec<OpenElement> = Vec::new();
        let mut roots = 0usize;

        loop {
            let event = reader
                .read_event()
                .chain_err(|| ErrorKind::CatalogParse(format!("at byte {}", reader.buffer_position())))?;

            match event {
                Event::Start(start) => {
                    if open.is_empty() {
                        roots += 1;
                        if roots > 1 {
                            bail!(ErrorKind::CatalogParse("more than one root element".to_string()));
                        }
                    }
                    if let Some(parent) = open.last_mut() {
                        parent.in_text = false;
                    }
                    open.push(OpenElement {
                        name: element_name(start.name().as_ref()),
                        texts: Vec::new(),
                        in_text: false,
                    });
                }
                Event::Empty(empty) => {
                    if open.is_empty() {
                        roots += 1;
                        if roots > 1 {
                            bail!(ErrorKind::CatalogParse("more than one root element".to_string()));
                        }
                    }
                    if let Some(parent) = open.last_mut() {
                        parent.in_text = false;
                    }
                    texts.entry(element_name(empty.name().as_ref())).or_default();
                }
                Event::End(_) => {
                    if let Some(element) = open.pop() {
                        texts.entry(element.name).or_default().extend(element.texts);
                    }
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .chain_err(|| ErrorKind::CatalogParse("bad character reference".to_string()))?;
                    match open.last_mut() {
                        Some(element) => element.push_text(&text),
                        None if text.trim().is_empty() => {}
                        None => bail!(ErrorKind::CatalogParse("text outside the root element".to_string())),
                    }
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    if let Some(element) = open.last_mut() {
                        element.push_text(&String::from_utf8_lossy(&raw));
                    }
                }
                Event::Comment(_) | Event::PI(_) => {
                    if let Some(element) = open.last_mut() {
                        element.in_text = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(element) = open.last() {
            bail!(ErrorKind::CatalogParse(format!("element <{}> is never closed", element.name)));
        }
        if roots == 0 {
            bail!(ErrorKind::CatalogParse("document has no root element".to_string()));
        }

        debug!(elements = texts.len(), "catalog parsed");
        Ok(Catalog { texts })
    }

    /// Looks up the text of the element named `name`.
    pub fn resolve(&self, name: &str) -> Resolution {
        match self.texts.get(name).map(Vec::as_slice) {
            None | Some([]) => Resolution::NotFound,
            Some([text]) => {
                let url = text.trim();
                if url.is_empty() {
                    Resolution::NotFound
                } else {
                    Resolution::Found(url.to_string())
                }
            }
            Some(many) => Resolution::Ambiguous(many.len()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.texts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
