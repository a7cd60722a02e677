//! Plain hexdump output for blobs and frame payloads.

const WIDTH: usize = 16;

fn printable(chr: u8) -> char {
    if (0x20..0x7f).contains(&chr) {
        chr as char
    } else {
        '.'
    }
}

fn format_line(address: usize, data: &[u8]) -> String {
    use std::fmt::Write;

    let mut line = String::new();
    let _ = write!(line, "{:04x}", address);
    for i in 0..WIDTH {
        if i % 8 == 0 {
            line.push(' ');
        }
        match data.get(i) {
            Some(b) => {
                let _ = write!(line, " {:02x}", b);
            }
            None => line.push_str("   "),
        }
    }
    line.push_str("  |");
    for b in data {
        line.push(printable(*b));
    }
    line.push('|');
    line
}

pub fn hexdump_prefix(prefix: &str, data: &[u8]) {
    for (i, chunk) in data.chunks(WIDTH).enumerate() {
        println!("{}{}", prefix, format_line(i * WIDTH, chunk));
    }
}
