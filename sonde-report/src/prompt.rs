//! Prompt builder for synthesis.

pub(crate) fn synthesis_system(source_count: usize, language: Option<&str>) -> String {
    let mut out = format!(
        "You write the final research report. Structure it as markdown with:\n\
         - a short abstract,\n\
         - topical sections developing the answer,\n\
         - a final \"Sources\" section listing every source you cited, one per line, as \
           `[n] Title — URL`.\n\n\
         Cite evidence inline with bracketed numbers like [2], referring only to the numbered \
         source list you were given ([1] through [{source_count}]). Do not invent sources or \
         citation numbers. Claims without support in the findings must be clearly marked as \
         uncertain."
    );
    if let Some(language) = language {
        out.push_str(&format!("\n\nWrite the report in {language}."));
    }
    out
}
