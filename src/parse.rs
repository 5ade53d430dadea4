//! Parsers for the text printed by external tools and the device console.

use nom::bytes::complete::{tag, take_till1, take_until, take_while_m_n};
use nom::character::complete::{char, digit1, hex_digit1, space0, space1};
use nom::branch::alt;
use nom::combinator::{map_res, opt, rest};
use nom::sequence::{delimited, preceded, separated_pair, terminated, tuple};
use nom::IResult;

fn hex_u16(input: &str) -> IResult<&str, u16> {
    map_res(hex_digit1, |s| u16::from_str_radix(s, 16))(input)
}

/// `idVendor=353f, idProduct=a101` somewhere in a kernel log line.
fn usb_id(input: &str) -> IResult<&str, (u16, u16)> {
    preceded(
        tuple((take_until("idVendor="), tag("idVendor="))),
        separated_pair(hex_u16, tag(", idProduct="), hex_u16),
    )(input)
}

/// Vendor and product announced by a kernel log line, if any.
pub fn kernel_usb_id(line: &str) -> Option<(u16, u16)> {
    usb_id(line).ok().map(|(_, id)| id)
}

/// `5: slcan0: <NOARP,UP,LOWER_UP> mtu 16 ...`, with an optional `@parent`.
fn link(input: &str) -> IResult<&str, &str> {
    preceded(
        tuple((space0, digit1, tag(": "))),
        take_till1(|c: char| c == ':' || c == '@'),
    )(input)
}

/// Interface name from one line of `ip -o link show`.
pub fn link_name(line: &str) -> Option<&str> {
    link(line).ok().map(|(_, name)| name)
}

fn if_suffix(input: &str) -> IResult<&str, u8> {
    preceded(
        tag("-if"),
        map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s| {
            u8::from_str_radix(s, 16)
        }),
    )(input)
}

/// USB interface number from a by-id name such as
/// `usb-OnLogic_K800_MCU_0001-if02`.
pub fn interface_number(name: &str) -> Option<u8> {
    let at = name.rfind("-if")?;
    if_suffix(&name[at..]).ok().map(|(_, n)| n)
}

/// Entry number: `3`, `3:` or Zephyr's `[  3]`.
fn entry_number(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('['), preceded(space0, digit1), char(']')),
        terminated(digit1, opt(char(':'))),
    ))(input)
}

/// `  3  set can-mode VCAN0 slcan`, `3: ...` or `[  3] ...`.
fn entry(input: &str) -> IResult<&str, &str> {
    preceded(tuple((space0, entry_number, space1)), rest)(input)
}

/// Command text of a numbered console history line.
pub fn history_entry(line: &str) -> Option<&str> {
    entry(line).ok().map(|(_, cmd)| cmd.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_line() {
        let line = "[ 3.141] usb 1-4: New USB device found, idVendor=353f, idProduct=a101, bcdDevice= 1.00";
        assert_eq!(kernel_usb_id(line), Some((0x353f, 0xa101)));
        let line = "usb 1-4: New USB device found, idVendor=353F, idProduct=A101";
        assert_eq!(kernel_usb_id(line), Some((0x353f, 0xa101)));
        assert_eq!(kernel_usb_id("usb 1-4: new full-speed USB device number 5"), None);
    }

    #[test]
    fn ip_link_lines() {
        let line = "5: slcan0: <NOARP,UP,LOWER_UP> mtu 16 qdisc pfifo_fast state UNKNOWN";
        assert_eq!(link_name(line), Some("slcan0"));
        let line = "7: eth0.10@eth0: <BROADCAST,MULTICAST> mtu 1500";
        assert_eq!(link_name(line), Some("eth0.10"));
        assert_eq!(link_name("    link/can"), None);
    }

    #[test]
    fn by_id_suffix() {
        assert_eq!(interface_number("usb-OnLogic_K800_MCU_0001-if00"), Some(0));
        assert_eq!(interface_number("usb-OnLogic_K800_MCU_0001-if02"), Some(2));
        assert_eq!(interface_number("usb-OnLogic_K800-if0a-port0"), Some(10));
        assert_eq!(interface_number("usb-OnLogic_K800_MCU_0001"), None);
    }

    #[test]
    fn history_lines() {
        assert_eq!(
            history_entry("  3  set can-mode VCAN0 slcan\r"),
            Some("set can-mode VCAN0 slcan")
        );
        assert_eq!(history_entry("12: history"), Some("history"));
        assert_eq!(
            history_entry("[  1] set can-mode VCAN0 slcan\r"),
            Some("set can-mode VCAN0 slcan")
        );
        assert_eq!(history_entry("[ 12] history"), Some("history"));
        assert_eq!(history_entry("uart:~$ history"), None);
        assert_eq!(history_entry("[x] history"), None);
    }
}
