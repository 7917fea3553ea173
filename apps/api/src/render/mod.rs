//! Résumé → HTML. Pure function of the record; the HTML is what the
//! conversion service prints to PDF.

use askama::Template;

use crate::models::resume::ResumeRecord;

#[derive(Template)]
#[template(path = "resume.html")]
struct ResumeTemplate<'a> {
    record: &'a ResumeRecord,
    contact: Vec<&'a str>,
}

/// Renders the printable HTML page for a résumé. User text is HTML-escaped.
pub fn render_resume_html(record: &ResumeRecord) -> Result<String, askama::Error> {
    ResumeTemplate {
        record,
        contact: record.contact_lines(),
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::sample_record;

    #[test]
    fn test_renders_every_section_in_order() {
        let html = render_resume_html(&sample_record()).unwrap();

        let positions: Vec<usize> = [
            "Ada Lovelace",
            "Personal Statement",
            "Key Skills",
            "Professional Experience",
            "Personal Interests",
        ]
        .iter()
        .map(|needle| html.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(html.contains("Analytical Engine Project"));
        assert!(html.contains("Wrote the first published algorithm"));
    }

    #[test]
    fn test_duties_keep_submitted_order() {
        let html = render_resume_html(&sample_record()).unwrap();
        let first = html.find("memoir").unwrap();
        let second = html.find("first published algorithm").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_user_text_is_escaped() {
        let mut record = sample_record();
        record.name = "<script>alert(1)</script>".to_string();
        record.skills = vec!["R&D".to_string()];

        let html = render_resume_html(&record).unwrap();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("R&D"));
        assert!(html.contains("&#60;script&#62;alert(1)&#60;/script&#62;"));
        assert!(html.contains("R&#38;D"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let record: ResumeRecord = serde_json::from_str(r#"{"name": "Grace Hopper"}"#).unwrap();
        let html = render_resume_html(&record).unwrap();
        assert!(html.contains("Grace Hopper"));
        assert!(!html.contains("Key Skills"));
        assert!(!html.contains("Professional Experience"));
        assert!(!html.contains("class=\"contact\""));
    }
}
