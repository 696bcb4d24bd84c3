// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label payloads.
//
// The engine does not interpret label languages; a payload is whatever bytes
// the printer understands. Stored formats are the one exception: recalling a
// format saved on the printer needs a short ZPL wrapper around the field data.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use etikett_bridge::traits::{PrinterConnection, SendAction};
use etikett_core::error::Result;

/// Content of one print request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelPayload {
    /// Raw bytes, sent unchanged.
    Bytes(Vec<u8>),
    /// A ZPL document.
    Zpl(String),
    /// Recall a format stored on the printer and fill its numbered fields.
    StoredFormat {
        name: String,
        fields: BTreeMap<u32, String>,
    },
}

impl LabelPayload {
    pub fn stored_format(name: impl Into<String>, fields: BTreeMap<u32, String>) -> Self {
        Self::StoredFormat {
            name: name.into(),
            fields,
        }
    }

    /// The exact bytes written to the printer.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Zpl(zpl) => zpl.as_bytes().to_vec(),
            Self::StoredFormat { name, fields } => render_stored_format(name, fields).into_bytes(),
        }
    }
}

#[async_trait]
impl SendAction for LabelPayload {
    async fn send(&self, connection: &mut dyn PrinterConnection) -> Result<()> {
        if !connection.is_open() {
            connection.open().await?;
        }
        let bytes = self.to_bytes();
        debug!(len = bytes.len(), "sending label payload");
        connection.write(&bytes).await
    }
}

/// `^XA^XFE:SHIPPING.ZPL^FS^FN1^FDvalue^FS...^XZ`
///
/// Names without a drive go to `E:`; names without an extension get `.ZPL`.
pub fn render_stored_format(name: &str, fields: &BTreeMap<u32, String>) -> String {
    let mut path = name.to_owned();
    if !path.contains(':') {
        path.insert_str(0, "E:");
    }
    if !path.contains('.') {
        path.push_str(".ZPL");
    }

    let mut zpl = format!("^XA^XF{path}^FS");
    for (number, value) in fields {
        zpl.push_str(&format!("^FN{number}^FD{value}^FS"));
    }
    zpl.push_str("^XZ");
    zpl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_format_recall() {
        let fields = BTreeMap::from([(2, "Widget".to_string()), (1, "SKU-42".to_string())]);
        assert_eq!(
            render_stored_format("SHIPPING", &fields),
            "^XA^XFE:SHIPPING.ZPL^FS^FN1^FDSKU-42^FS^FN2^FDWidget^FS^XZ"
        );
        assert_eq!(render_stored_format("R:LABEL.ZPL", &BTreeMap::new()), "^XA^XFR:LABEL.ZPL^FS^XZ");
    }

    #[test]
    fn zpl_and_bytes_are_sent_verbatim() {
        assert_eq!(LabelPayload::Zpl("^XA^XZ".into()).to_bytes(), b"^XA^XZ");
        assert_eq!(LabelPayload::Bytes(vec![0x1b, 0x40]).to_bytes(), vec![0x1b, 0x40]);
    }

    #[tokio::test]
    async fn send_opens_closed_connection_and_writes() {
        use crate::connection::ConnectionFactory;
        use crate::test_support::ScriptedPrinter;
        use etikett_core::types::ConnectionKind;

        let printer = ScriptedPrinter::ready();
        let mut connection = printer.create("AA", ConnectionKind::ClassicRadio).unwrap();
        LabelPayload::Zpl("^XA^XZ".into()).send(connection.as_mut()).await.unwrap();

        assert!(connection.is_open());
        assert_eq!(printer.opens(), 1);
        assert_eq!(printer.written(), vec![b"^XA^XZ".to_vec()]);
    }
}
