use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// The self-closing elements that carry edit/view restrictions.
///
/// Matching is textual: an element is removed when `<name` is followed by
/// anything other than `>` up to a closing `/>`. Elements left unclosed, or
/// whose attribute values contain `>`, do not match and stay in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionMarker {
    Workbook,
    Sheet,
}

impl ProtectionMarker {
    pub fn element_name(&self) -> &'static str {
        match self {
            ProtectionMarker::Workbook => "workbookProtection",
            ProtectionMarker::Sheet => "sheetProtection",
        }
    }

    fn pattern(&self) -> &'static Regex {
        static WORKBOOK: OnceLock<Regex> = OnceLock::new();
        static SHEET: OnceLock<Regex> = OnceLock::new();

        let cell = match self {
            ProtectionMarker::Workbook => &WORKBOOK,
            ProtectionMarker::Sheet => &SHEET,
        };

        cell.get_or_init(|| {
            let source = format!("<{}[^>]*/>", regex::escape(self.element_name()));
            Regex::new(&source).expect("protection pattern is a valid regex")
        })
    }

    pub fn count(&self, xml: &str) -> usize {
        self.pattern().find_iter(xml).count()
    }

    /// Removes every matching element. Borrows the input when nothing matched.
    pub fn strip<'a>(&self, xml: &'a str) -> Cow<'a, str> {
        self.pattern().replace_all(xml, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workbook_protection_removed() {
        let xml = r#"<workbook><workbookPr/><workbookProtection lockStructure="1" password="ABCD"/><sheets/></workbook>"#;

        let stripped = ProtectionMarker::Workbook.strip(xml);

        assert_eq!(stripped, "<workbook><workbookPr/><sheets/></workbook>");
        assert_eq!(ProtectionMarker::Workbook.count(&stripped), 0);
    }

    #[test]
    fn test_attribute_order_does_not_matter() {
        let a = r#"<x><sheetProtection sheet="1" password="CF1A"/></x>"#;
        let b = r#"<x><sheetProtection password="CF1A" sheet="1" objects="1"/></x>"#;

        assert_eq!(ProtectionMarker::Sheet.strip(a), "<x></x>");
        assert_eq!(ProtectionMarker::Sheet.strip(b), "<x></x>");
    }

    #[test]
    fn test_zero_occurrences_borrow_input() {
        let xml = r#"<worksheet><sheetData/></worksheet>"#;

        let stripped = ProtectionMarker::Sheet.strip(xml);

        assert!(matches!(stripped, Cow::Borrowed(_)));
        assert_eq!(stripped, xml);
    }

    #[test]
    fn test_multiple_occurrences_all_removed() {
        let xml = r#"<w><sheetProtection sheet="1"/><a/><sheetProtection password="X" sheet="1"/></w>"#;

        assert_eq!(ProtectionMarker::Sheet.count(xml), 2);
        assert_eq!(ProtectionMarker::Sheet.strip(xml), "<w><a/></w>");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let xml = r#"<w><sheetProtection sheet="1"/><sheetData/></w>"#;

        let once = ProtectionMarker::Sheet.strip(xml).into_owned();
        let twice = ProtectionMarker::Sheet.strip(&once).into_owned();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_multiline_element_removed() {
        let xml = "<w><sheetProtection\n    sheet=\"1\"\n    objects=\"1\"/>\n</w>";

        assert_eq!(ProtectionMarker::Sheet.strip(xml), "<w>\n</w>");
    }

    #[test]
    fn test_unclosed_element_left_untouched() {
        let xml = r#"<w><sheetProtection sheet="1"></sheetProtection></w>"#;

        assert_eq!(ProtectionMarker::Sheet.strip(xml), xml);
    }

    #[test]
    fn test_gt_inside_attribute_value_is_not_matched() {
        let xml = r#"<w><sheetProtection algorithmName="a>b" sheet="1"/></w>"#;

        assert_eq!(ProtectionMarker::Sheet.count(xml), 0);
        assert_eq!(ProtectionMarker::Sheet.strip(xml), xml);
    }

    #[test]
    fn test_markers_do_not_cross_match() {
        let xml = r#"<x><workbookProtection lockStructure="1"/><sheetProtection sheet="1"/></x>"#;

        assert_eq!(
            ProtectionMarker::Workbook.strip(xml),
            r#"<x><sheetProtection sheet="1"/></x>"#
        );
        assert_eq!(
            ProtectionMarker::Sheet.strip(xml),
            r#"<x><workbookProtection lockStructure="1"/></x>"#
        );
    }
}
