//! Extraction of values from Splunk REST (Atom) responses
//!
//! Entry content is a tree of `<s:dict>`, `<s:key name="...">`, `<s:list>`
//! and `<s:item>` elements. We only ever need the first key with a given name,
//! either its text or the items of the list it holds.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const KEY_TAG: &[u8] = b"s:key";
const ITEM_TAG: &[u8] = b"s:item";

#[derive(Debug, Default)]
struct KeyContent {
    text: String,
    items: Vec<String>,
}

fn key_name(element: &BytesStart<'_>) -> Result<Option<String>, quick_xml::Error> {
    match element
        .try_get_attribute("name")
        .map_err(quick_xml::Error::from)?
    {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn read_key(xml: &str, name: &str) -> Result<Option<KeyContent>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found: Option<KeyContent> = None;
    // Element depth below the matched key
    let mut depth = 0usize;
    let mut in_item = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                if found.is_some() {
                    depth += 1;
                    in_item = element.name().as_ref() == ITEM_TAG;
                } else if element.name().as_ref() == KEY_TAG
                    && key_name(&element)?.as_deref() == Some(name)
                {
                    found = Some(KeyContent::default());
                }
            },
            Event::Empty(element) => {
                if found.is_none()
                    && element.name().as_ref() == KEY_TAG
                    && key_name(&element)?.as_deref() == Some(name)
                {
                    return Ok(Some(KeyContent::default()));
                }
            },
            Event::End(_) => {
                if found.is_some() {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    in_item = false;
                }
            },
            Event::Text(text) => {
                if let Some(content) = found.as_mut() {
                    let value = text.unescape()?;
                    if depth == 0 {
                        content.text.push_str(&value);
                    } else if in_item {
                        content.items.push(value.into_owned());
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(found)
}

/// Text of the first `<s:key name="{name}">`, if present and non-empty
pub fn key_text(xml: &str, name: &str) -> Result<Option<String>, quick_xml::Error> {
    Ok(read_key(xml, name)?
        .map(|content| content.text)
        .filter(|text| !text.is_empty()))
}

/// `<s:item>` values listed under the first `<s:key name="{name}">`.
/// A missing key yields an empty list.
pub fn key_items(xml: &str, name: &str) -> Result<Vec<String>, quick_xml::Error> {
    Ok(read_key(xml, name)?
        .map(|content| content.items)
        .unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HEC_INPUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:s="http://dev.splunk.com/ns/rest">
  <title>inputs</title>
  <entry>
    <title>http://evtx2splunk</title>
    <content type="text/xml">
      <s:dict>
        <s:key name="disabled">0</s:key>
        <s:key name="eai:acl">
          <s:dict>
            <s:key name="app">splunk_httpinput</s:key>
          </s:dict>
        </s:key>
        <s:key name="index">main</s:key>
        <s:key name="indexes">
          <s:list>
            <s:item>main</s:item>
            <s:item>winevt</s:item>
          </s:list>
        </s:key>
        <s:key name="sourcetype"/>
        <s:key name="token">5c3a1d2e-1111-2222-3333-444455556666</s:key>
      </s:dict>
    </content>
  </entry>
</feed>"#;

    #[test]
    fn test_key_text() {
        assert_eq!(
            key_text(HEC_INPUT, "token").unwrap().as_deref(),
            Some("5c3a1d2e-1111-2222-3333-444455556666")
        );
        assert_eq!(key_text(HEC_INPUT, "index").unwrap().as_deref(), Some("main"));
        assert_eq!(key_text(HEC_INPUT, "sourcetype").unwrap(), None);
        assert_eq!(key_text(HEC_INPUT, "missing").unwrap(), None);
    }

    #[test]
    fn test_key_items() {
        assert_eq!(key_items(HEC_INPUT, "indexes").unwrap(), vec!["main", "winevt"]);
        assert!(key_items(HEC_INPUT, "missing").unwrap().is_empty());
    }

    #[test]
    fn test_key_without_list_has_no_items() {
        assert!(key_items(HEC_INPUT, "disabled").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(key_text("<s:key name=\"token\">abc</s:dict>", "token").is_err());
    }
}
