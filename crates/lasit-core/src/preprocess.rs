use unicode_normalization::UnicodeNormalization;

const SENTENCE_END: &[char] = &['.', '!', '?', '…'];
const CLOSING: &[char] = &['"', '\'', '”', '»', ')', ']'];

pub trait Preprocessor {
    // Default Latvian preprocessor: keeps paragraph breaks, collapses the rest
    fn process(&self, text: &str) -> String {
        let text: String = text.trim().nfc().collect();
        if text.is_empty() {
            return text;
        }

        text.replace("\r\n", "\n")
            .split("\n\n")
            .map(|paragraph| paragraph.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|paragraph| !paragraph.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub struct DefaultPreprocessor;
impl Preprocessor for DefaultPreprocessor {}

/// A group of consecutive sentences sent in one upstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Index of the first sentence in this chunk
    pub first_sentence: usize,
    pub text: String,
}

/// Split preprocessed text into sentences
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for paragraph in text.split("\n\n") {
        let chars: Vec<char> = paragraph.chars().collect();
        let mut current = String::new();
        let mut i = 0;

        while i < chars.len() {
            current.push(chars[i]);

            if SENTENCE_END.contains(&chars[i]) {
                while i + 1 < chars.len()
                    && (SENTENCE_END.contains(&chars[i + 1]) || CLOSING.contains(&chars[i + 1]))
                {
                    i += 1;
                    current.push(chars[i]);
                }

                if i + 1 == chars.len() || chars[i + 1].is_whitespace() {
                    let sentence = current.trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence.to_string());
                    }
                    current.clear();
                }
            }

            i += 1;
        }

        let rest = current.trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
    }

    sentences
}

/// Group sentences into chunks, neighbouring chunks sharing `overlap` sentences
pub fn chunk_sentences(sentences: &[String], per_chunk: usize, overlap: usize) -> Vec<Chunk> {
    let per_chunk = per_chunk.max(1);
    let step = per_chunk - overlap.min(per_chunk - 1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < sentences.len() {
        let end = (start + per_chunk).min(sentences.len());
        chunks.push(Chunk {
            index: chunks.len(),
            first_sentence: start,
            text: sentences[start..end].join(" "),
        });

        if end == sentences.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Preprocess, split and chunk raw user text
pub fn chunk_text(text: &str, per_chunk: usize, overlap: usize) -> Vec<Chunk> {
    let processed = DefaultPreprocessor.process(text);
    let sentences = split_sentences(&processed);
    tracing::debug!("Split input into {} sentences", sentences.len());
    chunk_sentences(&sentences, per_chunk, overlap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let text = DefaultPreprocessor
            .process("Anna pamostas agri.  Vai tu nāc?\nJā!\n\nJauna rindkopa bez punkta");

        let sentences = split_sentences(&text);

        assert_eq!(
            sentences,
            vec![
                "Anna pamostas agri.",
                "Vai tu nāc?",
                "Jā!",
                "Jauna rindkopa bez punkta",
            ]
        );
    }

    #[test]
    fn keeps_closing_quotes_and_decimals() {
        let sentences = split_sentences("Viņš teica: \"Labi.\" Cena ir 2.50 eiro.");
        assert_eq!(sentences, vec!["Viņš teica: \"Labi.\"", "Cena ir 2.50 eiro."]);
    }

    #[test]
    fn chunks_overlap_by_requested_sentences() {
        let sentences: Vec<String> = (1..=5).map(|i| format!("S{i}.")).collect();

        let chunks = chunk_sentences(&sentences, 3, 1);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "S1. S2. S3.");
        assert_eq!(chunks[1].text, "S3. S4. S5.");
        assert_eq!(chunks[1].first_sentence, 2);
    }

    #[test]
    fn oversized_overlap_still_advances() {
        let sentences: Vec<String> = (1..=3).map(|i| format!("S{i}.")).collect();
        let chunks = chunk_sentences(&sentences, 2, 5);
        assert_eq!(chunks.len(), 2);
        assert!(chunk_text("   ", 3, 1).is_empty());
    }
}
