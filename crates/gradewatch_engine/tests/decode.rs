use gradewatch_engine::decode_page;
use pretty_assertions::assert_eq;

#[test]
fn header_charset_is_honoured() {
    // "Prüfung" in Latin-1
    let bytes = b"<p>Pr\xfcfung</p>";

    let page = decode_page(bytes, Some("text/html; charset=ISO-8859-1"));
    assert_eq!(page.html, "<p>Prüfung</p>");
    assert!(!page.lossy);
}

#[test]
fn utf8_bom_wins_over_header() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice("Notenübersicht".as_bytes());

    let page = decode_page(&bytes, Some("text/html; charset=ISO-8859-1"));
    assert_eq!(page.html, "Notenübersicht");
    assert_eq!(page.encoding_label, "UTF-8");
}

#[test]
fn plain_utf8_without_charset() {
    let page = decode_page("Anmeldefehler ä".as_bytes(), Some("text/html"));
    assert_eq!(page.html, "Anmeldefehler ä");
    assert_eq!(page.encoding_label, "UTF-8");
}

#[test]
fn invalid_bytes_under_declared_charset_are_flagged_lossy() {
    let page = decode_page(b"Anmeldung f\xfcr", Some("text/html; charset=utf-8"));
    assert_eq!(page.html, "Anmeldung f\u{FFFD}r");
    assert!(page.lossy);
}
