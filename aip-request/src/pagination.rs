use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use aip_sql::PageClause;

use crate::error::RequestError;
use crate::options::PaginationOptions;

/// Stable fingerprint binding a page token to the filter and order that
/// shaped the page it points into. First 8 bytes of a SHA-256, so it
/// survives process restarts.
pub fn request_fingerprint(filter: &str, order_by: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(filter.as_bytes());
    hasher.update([0u8]);
    hasher.update(order_by.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().unwrap())
}

/// The decoded form of a page token: a row offset plus the fingerprint
/// of the request that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken {
    pub offset: u64,
    pub fingerprint: u64,
}

impl PageToken {
    /// Opaque URL-safe encoding: 16 little-endian bytes, unpadded
    /// base64.
    pub fn encode(&self) -> String {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes[8..].copy_from_slice(&self.fingerprint.to_le_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(token: &str) -> Result<Self, RequestError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| RequestError::InvalidPageToken)?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| RequestError::InvalidPageToken)?;
        Ok(Self {
            offset: u64::from_le_bytes(bytes[..8].try_into().unwrap()),
            fingerprint: u64::from_le_bytes(bytes[8..].try_into().unwrap()),
        })
    }
}

/// Enforces page-size bounds and validates page tokens.
pub struct PaginationRequestParser {
    default_page_size: u32,
    max_page_size: u32,
}

impl PaginationRequestParser {
    pub fn new(options: &PaginationOptions) -> Self {
        Self {
            default_page_size: options.default_page_size,
            max_page_size: options.max_page_size,
        }
    }

    /// Resolve the effective page size and offset for one call.
    ///
    /// A zero page size takes the configured default; exceeding the
    /// maximum or presenting a token minted for a different
    /// filter/order fails.
    pub fn parse(
        &self,
        page_size: i32,
        page_token: &str,
        fingerprint: u64,
    ) -> Result<ParsedPage, RequestError> {
        if page_size < 0 {
            return Err(RequestError::InvalidPageSize(page_size));
        }
        let page_size = if page_size == 0 {
            self.default_page_size
        } else {
            page_size as u32
        };
        if page_size > self.max_page_size {
            return Err(RequestError::PageSizeTooLarge {
                page_size,
                max: self.max_page_size,
            });
        }
        let offset = if page_token.is_empty() {
            0
        } else {
            let token = PageToken::decode(page_token)?;
            if token.fingerprint != fingerprint {
                return Err(RequestError::PageTokenMismatch);
            }
            token.offset
        };
        Ok(ParsedPage {
            offset,
            page_size,
            fingerprint,
        })
    }
}

/// The resolved pagination window of one call.
#[derive(Debug, Clone, Copy)]
pub struct ParsedPage {
    offset: u64,
    page_size: u32,
    fingerprint: u64,
}

impl ParsedPage {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// `OFFSET … LIMIT page_size + 1`; the extra row probes for a next
    /// page.
    pub fn sql_pagination(&self) -> String {
        PageClause::new(self.offset, self.page_size).sql()
    }

    /// Empty when the fetch came back within the page size; otherwise a
    /// token advancing the offset past this page.
    pub fn next_page_token(&self, items_fetched: usize) -> String {
        if items_fetched as u64 <= u64::from(self.page_size) {
            return String::new();
        }
        PageToken {
            offset: self.offset + u64::from(self.page_size),
            fingerprint: self.fingerprint,
        }
        .encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> PaginationRequestParser {
        PaginationRequestParser::new(&PaginationOptions {
            default_page_size: 50,
            max_page_size: 100,
        })
    }

    #[test]
    fn token_round_trips() {
        let token = PageToken {
            offset: 150,
            fingerprint: 0xdead_beef,
        };
        assert_eq!(PageToken::decode(&token.encode()).unwrap(), token);
    }

    #[test]
    fn garbage_tokens_are_invalid() {
        assert_eq!(
            PageToken::decode("not a token!").unwrap_err(),
            RequestError::InvalidPageToken
        );
        assert_eq!(
            PageToken::decode("AAAA").unwrap_err(),
            RequestError::InvalidPageToken
        );
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let fp = request_fingerprint("id = \"a\"", "id desc");
        assert_eq!(fp, request_fingerprint("id = \"a\"", "id desc"));
        assert_ne!(fp, request_fingerprint("id = \"b\"", "id desc"));
        assert_ne!(fp, request_fingerprint("id = \"a\"", "id"));
    }

    #[test]
    fn zero_page_size_takes_default() {
        let page = parser().parse(0, "", 7).unwrap();
        assert_eq!(page.page_size(), 50);
        assert_eq!(page.sql_pagination(), "OFFSET 0 LIMIT 51");
    }

    #[test]
    fn oversized_page_is_rejected() {
        assert_eq!(
            parser().parse(101, "", 7).unwrap_err(),
            RequestError::PageSizeTooLarge {
                page_size: 101,
                max: 100
            }
        );
    }

    #[test]
    fn negative_page_size_is_rejected() {
        assert_eq!(
            parser().parse(-1, "", 7).unwrap_err(),
            RequestError::InvalidPageSize(-1)
        );
    }

    #[test]
    fn token_fingerprint_must_match() {
        let token = PageToken {
            offset: 50,
            fingerprint: 7,
        }
        .encode();
        assert_eq!(parser().parse(50, &token, 7).unwrap().offset(), 50);
        assert_eq!(
            parser().parse(50, &token, 8).unwrap_err(),
            RequestError::PageTokenMismatch
        );
    }

    #[test]
    fn next_page_token_only_when_probe_row_returned() {
        let page = parser().parse(50, "", 7).unwrap();
        assert_eq!(page.next_page_token(50), "");
        assert_eq!(page.next_page_token(12), "");

        let token = page.next_page_token(51);
        let decoded = PageToken::decode(&token).unwrap();
        assert_eq!(decoded.offset, 50);
        assert_eq!(decoded.fingerprint, 7);
    }
}
