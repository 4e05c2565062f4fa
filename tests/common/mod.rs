use terminfo_exec::names::{Kind, position};

const ABSENT: u16 = 0xffff;

/// Writer of compiled terminfo entries in the legacy format
#[derive(Clone, Default)]
pub struct EntryBuilder {
    names: Vec<u8>,
    booleans: Vec<u8>,
    numbers: Vec<u16>,
    strings: Vec<Option<Vec<u8>>>,
}

fn slot<T: Clone>(values: &mut Vec<T>, index: usize, filler: T) -> &mut T {
    if values.len() <= index {
        values.resize(index + 1, filler);
    }
    &mut values[index]
}

impl EntryBuilder {
    pub fn new(names: &str) -> Self {
        Self {
            names: names.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    pub fn flag(mut self, name: &str) -> Self {
        let index = position(Kind::Boolean, name).unwrap();
        *slot(&mut self.booleans, index, 0) = 1;
        self
    }

    pub fn number(mut self, name: &str, value: u16) -> Self {
        let index = position(Kind::Number, name).unwrap();
        *slot(&mut self.numbers, index, ABSENT) = value;
        self
    }

    pub fn string(mut self, name: &str, value: &[u8]) -> Self {
        let index = position(Kind::String, name).unwrap();
        *slot(&mut self.strings, index, None) = Some(value.to_vec());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut heap = vec![];
        let mut offsets = vec![];
        for value in &self.strings {
            match value {
                Some(value) => {
                    offsets.push(heap.len() as u16);
                    heap.extend_from_slice(value);
                    heap.push(0);
                }
                None => offsets.push(ABSENT),
            }
        }

        let mut buffer = vec![0x1a, 0x01];
        for size in [
            self.names.len() + 1,
            // one extra byte that readers skip
            self.booleans.len() + 1,
            self.numbers.len(),
            self.strings.len(),
            heap.len(),
        ] {
            buffer.extend_from_slice(&(size as u16).to_le_bytes());
        }
        buffer.extend_from_slice(&self.names);
        buffer.push(0);
        buffer.extend_from_slice(&self.booleans);
        buffer.push(0);
        if !buffer.len().is_multiple_of(2) {
            buffer.push(0);
        }
        for value in self.numbers.iter().chain(&offsets) {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
        buffer.extend_from_slice(&heap);
        buffer
    }
}
