use fatoora_seal::invoice::chain::hash_document;
use fatoora_seal::invoice::{Element, InvoiceDocument, QrField, QrPayload, QrPhase};
use proptest::prelude::*;

const CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

fn document(id: &str, note: &str) -> InvoiceDocument {
    InvoiceDocument::new(
        Element::new("Invoice")
            .with_attribute("xmlns:cbc", CBC_NS)
            .with_child(Element::new("cbc:ID").with_text(id))
            .with_child(Element::new("cbc:Note").with_attribute("languageID", "ar").with_text(note)),
    )
}

proptest! {
    #[test]
    fn hash_survives_write_and_reparse(id in "[A-Za-z0-9-]{1,20}", note in "\\PC{0,40}") {
        let original = document(&id, &note);
        let xml = original.to_xml().expect("xml");
        let reparsed = InvoiceDocument::parse(&xml).expect("parse");
        prop_assert_eq!(
            hash_document(&original).expect("hash"),
            hash_document(&reparsed).expect("hash")
        );
    }

    #[test]
    fn different_ids_hash_differently(a in "[A-Z0-9]{1,12}", b in "[A-Z0-9]{1,12}") {
        prop_assume!(a != b);
        prop_assert_ne!(
            hash_document(&document(&a, "x")).expect("hash"),
            hash_document(&document(&b, "x")).expect("hash")
        );
    }

    #[test]
    fn tlv_accepts_exactly_up_to_255_bytes(len in 0usize..300) {
        let payload = QrPayload::new()
            .with_field(QrField::SellerName, vec![b'a'; len])
            .with_field(QrField::VatNumber, "399999999900003")
            .with_field(QrField::Timestamp, "2024-01-01T00:00:00Z")
            .with_field(QrField::TotalWithVat, "1.00")
            .with_field(QrField::VatTotal, "0.15");
        let result = payload.encode(QrPhase::Basic, usize::MAX);
        prop_assert_eq!(result.is_ok(), len <= 255);
        if let Ok(encoded) = result {
            prop_assert_eq!(QrPayload::decode(&encoded).expect("decode"), payload);
        }
    }
}
