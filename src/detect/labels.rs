/// MobileNet-SSD (PASCAL VOC) label table. Index 0 is the background class.
pub const LABELS: [&str; 21] = [
    "background",
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

/// Label for a class index; indices outside the table map to `"unknown"`.
pub fn label_name(index: usize) -> &'static str {
    LABELS.get(index).copied().unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_labels() {
        assert_eq!(label_name(15), "person");
        assert_eq!(label_name(0), "background");
        assert_eq!(label_name(99), "unknown");
    }
}
