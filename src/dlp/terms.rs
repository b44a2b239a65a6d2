use crate::dlp::corpus::ProtectedEmbedding;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Static multilingual seed list for the sensitive set. Grouped by concern;
/// extend as needed.
const SENSITIVE_TERMS: &[&str] = &[
    // Confidentiality / leakage
    "secret", "confidential", "proprietary", "classified", "restricted", "leak", "leaking",
    "leakage", "disclose", "disclosed", "breach", "exfiltrate", "exfiltration", "dump",
    "sensitive",
    // HE
    "סוד", "סודי", "חסוי", "קנייני", "מסווג", "מוגבל", "דליפה", "דליפות", "זליגה", "חשיפה",
    "לחשוף", "פרצה",
    // ES
    "secreto", "confidencial", "clasificado", "restringido", "filtración", "fuga", "divulgar",
    "divulgación", "sensible",
    // FR
    "confidentiel", "classifié", "restreint", "fuite", "divulgation",
    // AR
    "سر", "سري", "سريّة", "تسريب", "تسريبات", "كشف", "اختراق", "حسّاس",
    // RU
    "секрет", "конфиденциально", "секретно", "утечка", "утечки", "раскрытие", "взлом",
    "чувствительный",
    // ZH (Simplified)
    "机密", "保密", "绝密", "受限", "泄露", "泄漏", "外泄", "披露", "敏感", "漏洞",
    // Malicious intent
    "steal", "theft", "hack", "hacking", "exploit", "bypass", "backdoor", "ransom",
    "ransomware",
    "גניבה", "לגנוב", "שוד", "פריצה", "לפרוץ", "האקר", "האק", "לעקוף", "עקיפה", "כופרה",
    "לשאוב", "שאיבה",
    "robar", "robo", "hacker", "piratear", "explotar", "ransomware",
    "vol", "voler", "pirater", "piratage", "contourner", "rançongiciel",
    "سرقة", "اسرق", "هاكر", "استغلال", "تجاوز",
    "кража", "украсть", "хакер", "эксплойт", "обход", "бекдор", "вымогатель",
    "盗取", "窃取", "黑客", "入侵", "攻击", "利用", "绕过", "后门", "勒索软件",
    // Credentials and auth
    "password", "token", "api_key", "apikey", "secret_key", "client_secret", "privatekey",
    "ssh", "rsa",
    "סיסמה", "סיסמא", "טוקן", "מפתח", "אימות", "כניסה",
    "contraseña", "clave", "llave", "autenticación",
    "motdepasse", "jeton", "clé", "authentification",
    "رمز", "مفتاح", "مصادقة",
    "пароль", "токен", "ключ", "аутентификация",
    "密码", "口令", "令牌", "访问令牌", "密钥", "秘钥", "私钥", "客户端密钥", "认证",
    "身份验证",
    // Personal / financial
    "ssn", "passport", "credit", "card", "cvv", "iban", "swift", "email", "phone",
    "דרכון", "אשראי", "אימייל", "טלפון", "כתובת",
    "dni", "pasaporte", "crédito", "tarjeta", "correo", "teléfono", "dirección",
    "cin", "passeport", "crédit", "carte", "courriel", "téléphone", "adresse",
    "ائتمان", "بطاقة", "بريد", "هاتف", "عنوان",
    "паспорт", "кредит", "карта", "почта", "телефон", "адрес",
    "身份证", "护照", "信用卡", "卡号", "安全码", "邮箱", "电子邮件", "电话", "地址",
    "银行账号", "账户",
    // Source code / config
    ".env", "dotenv", "pem", "vault", "secrets",
    // Domain-specific (protected recipe corpus)
    "recipe", "ingredients", "formula", "gorgonzola", "mozzarella", "parmesan", "tomato",
    "sauce", "dough",
];

/// Common benign chat smalltalk; a message made only of these is allowed
/// without any deeper check.
const BENIGN_TERMS: &[&str] = &[
    "hi", "hello", "hey", "yo", "thanks", "thank", "please", "sorry", "ok", "okay", "cool",
    "great", "nice", "good", "bad", "yes", "no", "maybe", "sure", "fine", "done", "later",
    "bye", "goodbye", "welcome", "cheers", "congrats", "well", "morning", "evening", "night",
    "today", "tomorrow", "yesterday", "soon", "now", "minute", "second", "hour", "how", "are",
    "you", "doing", "what", "when", "where", "why", "who", "which", "because", "see", "lol",
    "haha", "brb", "gtg", "idk", "imo", "imho", "pls", "thx", "np",
    // HE common chat
    "שלום", "היי", "הי", "תודה", "בבקשה", "מצוין", "מעולה", "אחלה", "סבבה", "כן", "לא",
    "אולי", "ברור", "בסדר", "ביי", "להתראות", "בוקר", "היום", "מחר", "אתמול", "עכשיו",
    "מיד", "שניה", "שנייה", "דקה", "שעה", "מה", "מתי", "איפה", "למה", "מי", "איך", "איזה",
    "בגלל", "נתראה", "בקרוב", "חח", "חחח", "לול", "תכף",
];

/// Lowercase, NFKC-normalize, fold punctuation and symbols to spaces,
/// collapse runs of whitespace.
pub fn normalize_token(raw: &str) -> String {
    let folded: String = raw
        .nfkc()
        .collect::<String>()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_token(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    normalized.split(' ').map(str::to_string).collect()
}

/// Immutable sensitive/benign token sets, built once at engine
/// initialization. The sensitive set is seeded from the static wordlist plus
/// every token harvested from the protected-content corpus, so vocabulary
/// specific to the protected material automatically becomes a trigger.
pub struct TermSets {
    sensitive: HashSet<String>,
    benign: HashSet<String>,
}

impl TermSets {
    pub fn build(corpus: &[ProtectedEmbedding]) -> Self {
        let mut sensitive = HashSet::new();
        for term in SENSITIVE_TERMS {
            // Multi-word seeds contribute their individual tokens
            for tok in tokenize(term) {
                sensitive.insert(tok);
            }
        }
        for item in corpus {
            for tok in tokenize(&item.name) {
                sensitive.insert(tok);
            }
            for source in &item.tokens {
                for tok in tokenize(source) {
                    sensitive.insert(tok);
                }
            }
        }

        let benign = BENIGN_TERMS.iter().map(|t| normalize_token(t)).collect();

        Self { sensitive, benign }
    }

    pub fn is_sensitive(&self, token: &str) -> bool {
        self.sensitive.contains(token)
    }

    pub fn is_benign(&self, token: &str) -> bool {
        self.benign.contains(token)
    }

    pub fn sensitive_len(&self) -> usize {
        self.sensitive.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_punctuation_and_case() {
        assert_eq!(normalize_token("Secret!!!"), "secret");
        assert_eq!(normalize_token("  API_key:  value  "), "api key value");
    }

    #[test]
    fn test_tokenize_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!! ...").is_empty());
    }

    #[test]
    fn test_static_seed_terms_present() {
        let sets = TermSets::build(&[]);
        assert!(sets.is_sensitive("secret"));
        assert!(sets.is_sensitive("recipe"));
        assert!(sets.is_sensitive("пароль"));
        assert!(sets.is_benign("hello"));
        assert!(!sets.is_sensitive("weather"));
    }

    #[test]
    fn test_corpus_vocabulary_becomes_sensitive() {
        let corpus = vec![ProtectedEmbedding {
            id: "1".to_string(),
            name: "Nonna's Marinara".to_string(),
            embedding: vec![0.0; 4],
            tokens: vec!["san marzano tomatoes".to_string(), "basil".to_string()],
        }];
        let sets = TermSets::build(&corpus);
        assert!(sets.is_sensitive("marinara"));
        assert!(sets.is_sensitive("marzano"));
        assert!(sets.is_sensitive("basil"));
    }
}
