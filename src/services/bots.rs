use rand::seq::SliceRandom;
use rand::Rng;

use crate::names;

/// Picks a bot name not already used in the game.
///
/// Half the time a curated name is used (`curated` from storage, or the built-in
/// list when storage has none); otherwise adjective + noun with an optional
/// two-digit suffix.
pub fn bot_name<R: Rng + ?Sized>(rng: &mut R, curated: &[String], taken: &[String]) -> String {
    let is_free = |name: &str| !taken.iter().any(|t| t.eq_ignore_ascii_case(name));

    if rng.gen_bool(0.5) {
        let mut pool: Vec<&str> = if curated.is_empty() {
            names::CURATED_BOT_NAMES.to_vec()
        } else {
            curated.iter().map(String::as_str).collect()
        };
        pool.retain(|name| is_free(*name));
        if let Some(name) = pool.choose(rng) {
            return name.to_string();
        }
    }

    loop {
        let adjective = names::BOT_ADJECTIVES.choose(rng).copied().unwrap_or("Swift");
        let noun = names::BOT_NOUNS.choose(rng).copied().unwrap_or("Falcon");
        let mut name = format!("{adjective}{noun}");
        if rng.gen_bool(0.5) {
            name.push_str(&format!("{:02}", rng.gen_range(10..100)));
        }
        if is_free(&name) {
            return name;
        }
    }
}

/// A bot's answer for one turn: whether it was right and how long it "thought".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotAnswer {
    pub correct: bool,
    pub response_ms: i64,
}

pub fn simulate_answer<R: Rng + ?Sized>(rng: &mut R) -> BotAnswer {
    BotAnswer {
        correct: rng.gen_bool(names::BOT_ACCURACY),
        response_ms: rng.gen_range(names::BOT_MIN_RESPONSE_MS..=names::BOT_MAX_RESPONSE_MS),
    }
}

/// Six characters from the unambiguous alphabet, shown as `XXX-XXX`.
pub fn room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let chars: Vec<char> = (0..names::ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..names::ROOM_CODE_ALPHABET.len());
            char::from(names::ROOM_CODE_ALPHABET[idx])
        })
        .collect();
    let (head, tail) = chars.split_at(names::ROOM_CODE_LEN / 2);
    format!(
        "{}-{}",
        head.iter().collect::<String>(),
        tail.iter().collect::<String>()
    )
}

/// Uppercases and restores the dash so `abc def`, `abcdef` and `ABC-DEF` match.
pub fn normalize_room_code(input: &str) -> Option<String> {
    let compact: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if compact.len() != names::ROOM_CODE_LEN {
        return None;
    }
    let (head, tail) = compact.split_at(names::ROOM_CODE_LEN / 2);
    Some(format!("{head}-{tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn room_codes_avoid_ambiguous_characters() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let code = room_code(&mut rng);
            assert_eq!(code.len(), 7);
            assert_eq!(&code[3..4], "-");
            assert!(!code.contains(['0', 'O', '1', 'I', 'L']), "{code}");
        }
    }

    #[test]
    fn room_code_input_is_normalized() {
        assert_eq!(normalize_room_code("abc def").as_deref(), Some("ABC-DEF"));
        assert_eq!(normalize_room_code("ABC-DEF").as_deref(), Some("ABC-DEF"));
        assert_eq!(normalize_room_code("ABCDE"), None);
    }

    #[test]
    fn bot_names_are_unique_within_game() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut taken: Vec<String> = Vec::new();
        for _ in 0..30 {
            let name = bot_name(&mut rng, &[], &taken);
            assert!(!taken.contains(&name), "duplicate {name}");
            taken.push(name);
        }
    }

    #[test]
    fn curated_names_come_from_storage_first() {
        let mut rng = StdRng::seed_from_u64(13);
        let curated = vec!["OnlyCurated".to_string()];
        let names: Vec<String> = (0..50).map(|_| bot_name(&mut rng, &curated, &[])).collect();
        assert!(names.iter().any(|n| n == "OnlyCurated"));
        assert!(!names.iter().any(|n| n == "FrameByFrame"));
    }

    #[test]
    fn bot_answers_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(14);
        let answers: Vec<BotAnswer> = (0..500).map(|_| simulate_answer(&mut rng)).collect();
        assert!(answers.iter().all(|a| (800..=4000).contains(&a.response_ms)));
        let correct = answers.iter().filter(|a| a.correct).count();
        assert!((150..350).contains(&correct), "{correct} correct");
    }
}
