//! Member name to protocol method name derivation.

/// Rewrite a camel-case member name into the protocol's snake-case method
/// name: `signAndSendTransactions` becomes `sign_and_send_transactions`.
///
/// Every ASCII upper-case letter is replaced by `_` and its lower-case form;
/// the rest of the name is lower-cased.
pub fn to_method_name(member: &str) -> String {
    let mut method = String::with_capacity(member.len() + 4);
    for c in member.chars() {
        if c.is_ascii_uppercase() {
            method.push('_');
            method.push(c.to_ascii_lowercase());
        } else {
            method.extend(c.to_lowercase());
        }
    }
    method
}
